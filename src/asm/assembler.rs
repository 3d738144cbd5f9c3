use nom::{
    character::complete::space1,
    combinator::{eof, opt},
    sequence::{pair, preceded, separated_pair},
};
use rustc_hash::FxHashMap;

use crate::plat::{AluSource, BinaryOp, Condition, Instruction, Opcode, UnaryOp, STACK_START};

use super::{
    lexer::{
        address, alu_operand, data_reg, load_source, move_dest, move_source, output_kind,
        parse_operands, separator, split_line, syntax, target, AluOperand, LoadSource, Target,
    },
    AResult, AsmError, Span, Statement, StatementKind,
};

/// An assembly context capable of translating a source file into machine code.
///
/// The first pass turns source lines into [`Statement`]s and records labels; the second pass
/// resolves labels and encodes the byte stream.
#[derive(Debug, Default)]
pub struct Assembler {
    labels: FxHashMap<String, usize>,
    statements: Vec<Statement>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates machine code from assembly source code.
    ///
    /// # Errors
    ///
    /// This function will return an error if the source is not valid syntax, or if it refers to
    /// an undefined label. No partial output is produced.
    pub fn assemble(&mut self, source: &str) -> AResult<Vec<u8>> {
        self.first_pass(source)?;
        self.second_pass()
    }

    /// Parses every line into the intermediate form and builds the label table. Blank and
    /// comment lines do not count towards the line index labels resolve to.
    ///
    /// # Errors
    ///
    /// This function will return an error for the first line that is not valid syntax.
    pub fn first_pass(&mut self, source: &str) -> AResult<()> {
        self.labels.clear();
        self.statements.clear();
        let mut index = 0;
        for (n, text) in source.lines().enumerate() {
            let line = n + 1;
            let Some(parts) = split_line(text, line)? else {
                continue;
            };
            index += 1;
            if let Some(label) = parts.label {
                let name = label.fragment().to_lowercase();
                if self.labels.insert(name, index).is_some() {
                    return Err(syntax(line, label, format!("duplicate label '{}'", label.fragment())));
                }
            }
            let mnemonic = parts.mnemonic.fragment().to_lowercase();
            let kind = parse_statement(&mnemonic, parts.mnemonic, parts.operands, line)?;
            self.statements.push(Statement { line, index, kind });
        }
        Ok(())
    }

    /// Resolves labels and encodes every statement as an `(opcode, operand)` byte pair.
    ///
    /// # Errors
    ///
    /// This function will return an error if a jump or call names an undefined label.
    pub fn second_pass(&self) -> AResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.statements.len() * 2);
        for stmt in &self.statements {
            let instr = match &stmt.kind {
                StatementKind::Noop => continue,
                StatementKind::Instruction(instr) => *instr,
                StatementKind::Branch { op, label } => {
                    let index = self.labels.get(label).ok_or_else(|| AsmError::UnknownLabel {
                        line: stmt.line,
                        label: label.clone(),
                    })?;
                    // label targets are line indices, emitted as they are
                    Instruction::new(*op, *index as u8)
                }
            };
            out.extend_from_slice(&instr.to_bytes());
        }
        log::debug!("assembled {} statements into {} bytes", self.statements.len(), out.len());
        Ok(out)
    }

    /// The label table: label name to the line index it marks.
    pub fn labels(&self) -> &FxHashMap<String, usize> {
        &self.labels
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The intermediate form as normalized text, one statement per line.
    pub fn intermediate(&self) -> String {
        self.statements
            .iter()
            .map(|stmt| format!("{stmt}\n"))
            .collect()
    }
}

/// Assembles `source` with a fresh [`Assembler`].
///
/// # Errors
///
/// See [`Assembler::assemble`].
pub fn assemble(source: &str) -> AResult<Vec<u8>> {
    Assembler::new().assemble(source)
}

fn missing(line: usize, message: &str) -> AsmError {
    AsmError::MissingOperand {
        line,
        message: message.to_owned(),
    }
}

fn instr(op: Opcode, operand: u8) -> StatementKind {
    StatementKind::Instruction(Instruction::new(op, operand))
}

fn parse_statement(
    mnemonic: &str,
    at: Span,
    operands: Span,
    line: usize,
) -> AResult<StatementKind> {
    let blank = operands.fragment().trim().is_empty();
    let no_operands = |kind: StatementKind| -> AResult<StatementKind> {
        parse_operands(operands, line, "unexpected operand", eof)?;
        Ok(kind)
    };

    match mnemonic {
        "load" => {
            if blank {
                return Err(missing(line, "expected load origin after 'load' command"));
            }
            let (src, reg) = parse_operands(
                operands,
                line,
                "expected 'OP' or '$OP', then 'A' or 'B' after 'load' command",
                separated_pair(load_source, separator, data_reg),
            )?;
            Ok(match src {
                LoadSource::Immediate(lit) => instr(Opcode::LoadImm(reg), lit.evaluate(line)?),
                LoadSource::Memory(lit) => instr(Opcode::LoadMem(reg), lit.evaluate(line)?),
            })
        }
        "store" => {
            if blank {
                return Err(missing(line, "expected store destination after 'store' command"));
            }
            let (reg, lit) = parse_operands(
                operands,
                line,
                "expected 'A' or 'B', then '$OP' after 'store' command",
                separated_pair(data_reg, separator, address),
            )?;
            Ok(instr(Opcode::Store(reg), lit.evaluate(line)?))
        }
        "add" | "sub" | "or" | "xor" | "and" => {
            let op = match mnemonic {
                "add" => BinaryOp::Add,
                "sub" => BinaryOp::Sub,
                "or" => BinaryOp::Or,
                "xor" => BinaryOp::Xor,
                _ => BinaryOp::And,
            };
            if blank {
                return Err(missing(
                    line,
                    "expected second operand after arithmetic or logic command",
                ));
            }
            let operand = parse_operands(
                operands,
                line,
                "expected 'B', 'X', '$OP', '$B' or '$X'",
                alu_operand,
            )?;
            Ok(match operand {
                AluOperand::B => instr(Opcode::Alu(op, AluSource::B), 0),
                AluOperand::X => instr(Opcode::Alu(op, AluSource::X), 0),
                AluOperand::Memory(lit) => {
                    instr(Opcode::Alu(op, AluSource::Memory), lit.evaluate(line)?)
                }
                AluOperand::MemoryAtB => instr(Opcode::Alu(op, AluSource::MemoryAtB), 0),
                AluOperand::MemoryAtX => instr(Opcode::Alu(op, AluSource::MemoryAtX), 0),
            })
        }
        "not" => no_operands(instr(Opcode::Unary(UnaryOp::Not), 0)),
        "bitsl" => no_operands(instr(Opcode::Unary(UnaryOp::Shl), 0)),
        "bitsr" => no_operands(instr(Opcode::Unary(UnaryOp::Shr), 0)),
        "inc" => no_operands(instr(Opcode::Unary(UnaryOp::Inc), 0)),
        "dec" => no_operands(instr(Opcode::Unary(UnaryOp::Dec), 0)),
        "out" => {
            if blank {
                return Ok(instr(Opcode::Display, 0));
            }
            let (kind, value) = parse_operands(
                operands,
                line,
                "expected 'cmd', 'addr' or 'dat' after 'out' command",
                pair(output_kind, opt(preceded(space1, load_source))),
            )?;
            match value {
                None => Err(missing(line, "expected 'OP' or '$OP' after output type")),
                Some(LoadSource::Immediate(lit)) => {
                    Ok(instr(Opcode::Output(kind), lit.evaluate(line)?))
                }
                Some(LoadSource::Memory(lit)) => {
                    Ok(instr(Opcode::OutputIndirect(kind), lit.evaluate(line)?))
                }
            }
        }
        "jmp" | "jmpc" | "jmpnc" | "jmpz" | "jmpnz" | "jmpp" | "jmpnp" | "call" => {
            let op = match mnemonic {
                "jmp" => Opcode::Jump(Condition::Always),
                "jmpc" => Opcode::Jump(Condition::Carry),
                "jmpnc" => Opcode::Jump(Condition::NoCarry),
                "jmpz" => Opcode::Jump(Condition::Zero),
                "jmpnz" => Opcode::Jump(Condition::NotZero),
                "jmpp" => Opcode::Jump(Condition::Parity),
                "jmpnp" => Opcode::Jump(Condition::NoParity),
                _ => Opcode::Call,
            };
            if blank {
                return Err(missing(line, "expected '$OP' or 'label' in jump or call command"));
            }
            let target = parse_operands(
                operands,
                line,
                "expected '$OP' or 'label' in jump or call command",
                target,
            )?;
            Ok(match target {
                Target::Address(lit) => instr(op, lit.evaluate(line)?),
                Target::Label(label) => StatementKind::Branch {
                    op,
                    label: label.fragment().to_lowercase(),
                },
            })
        }
        "move" => {
            if blank {
                return Err(missing(line, "expected register names after 'move' command"));
            }
            let (src, dest) = parse_operands(
                operands,
                line,
                "expected 'A', 'B' or 'SP', then 'A', 'B' or 'X' after 'move' command",
                separated_pair(move_source, separator, move_dest),
            )?;
            Ok(instr(Opcode::Move(src, dest), 0))
        }
        "push" | "pop" => {
            if blank {
                return Err(missing(line, "expected 'A' or 'B' in push or pop command"));
            }
            let reg = parse_operands(
                operands,
                line,
                "expected 'A' or 'B' in push or pop command",
                data_reg,
            )?;
            let op = if mnemonic == "push" {
                Opcode::Push(reg)
            } else {
                Opcode::Pop(reg)
            };
            Ok(instr(op, 0))
        }
        "swap" => no_operands(instr(Opcode::Swap, 0)),
        "return" => no_operands(instr(Opcode::Return, 0)),
        "halt" => no_operands(instr(Opcode::Halt, 0)),
        // the stack starts at its default top
        "stkrest" => no_operands(instr(Opcode::StackReset, STACK_START)),
        "noop" => no_operands(StatementKind::Noop),
        _ => Err(syntax(line, at, format!("unknown command '{}'", at.fragment()))),
    }
}
