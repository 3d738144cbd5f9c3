//! The assembler module for SA2.

use std::fmt;

use nom_locate::LocatedSpan;
use thiserror::Error;

use crate::plat::{Instruction, Opcode};

pub mod assembler;
pub mod lexer;

pub use assembler::{assemble, Assembler};

pub type Span<'a> = LocatedSpan<&'a str>;

/// An error for the assembler module of SA2. Every variant carries the 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("syntax error in line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("missing element in line {line}: {message}")]
    MissingOperand { line: usize, message: String },
    #[error("unknown label `{label}` in line {line}")]
    UnknownLabel { line: usize, label: String },
}

impl AsmError {
    /// The source line the error was found in.
    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. }
            | Self::MissingOperand { line, .. }
            | Self::UnknownLabel { line, .. } => *line,
        }
    }
}

/// Type alias for Result<T, [AsmError]>.
pub type AResult<T> = Result<T, AsmError>;

/// What one source line assembles to, before labels are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// A complete instruction.
    Instruction(Instruction),
    /// A jump or call whose operand is the line index of a label.
    Branch { op: Opcode, label: String },
    /// `noop`: occupies a line index but emits no bytes.
    Noop,
}

/// One instruction line of the intermediate form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based line in the source text.
    pub line: usize,
    /// 1-based index among instruction lines. Labels resolve to this.
    pub index: usize,
    pub kind: StatementKind,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatementKind::Instruction(instr) => write!(f, "{instr}"),
            StatementKind::Branch {
                op: Opcode::Jump(cond),
                label,
            } => write!(f, "{} {label}", cond.mnemonic()),
            StatementKind::Branch { label, .. } => write!(f, "call {label}"),
            StatementKind::Noop => write!(f, "noop"),
        }
    }
}
