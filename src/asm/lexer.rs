use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{alpha1, char, digit1, one_of, satisfy, space0, space1},
    combinator::{all_consuming, eof, map, map_res, not, opt, peek, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use nom_locate::position;

use crate::plat::{DataReg, MoveDest, MoveSource, OutputKind};

use super::{AResult, AsmError, Span};

/// Starts a comment that runs to the end of the line.
pub const COMMENT: char = '/';

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Matches `word` case-insensitively, but not as the prefix of a longer word.
pub fn keyword<'a>(word: &'static str) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, Span<'a>> {
    terminated(tag_no_case(word), not(satisfy(is_word_char)))
}

/// A label name: letters, digits and underscores.
pub fn name(inp: Span) -> IResult<Span, Span> {
    take_while1(is_word_char)(inp)
}

pub fn number(inp: Span) -> IResult<Span, i64> {
    map_res(digit1, |digits: Span| digits.fragment().parse::<i64>())(inp)
}

/// An operand literal: `N`, `N+M` or `N-M`. Further terms are parsed so they can be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal<'a> {
    pub pos: Span<'a>,
    pub first: i64,
    pub rest: Vec<(char, i64)>,
}

impl<'a> Literal<'a> {
    /// Evaluates the literal, truncating the result to a byte.
    ///
    /// # Errors
    ///
    /// This function will return an error if the literal has more than two operands or if the
    /// arithmetic overflows.
    pub fn evaluate(&self, line: usize) -> AResult<u8> {
        let value = match self.rest.as_slice() {
            [] => Some(self.first),
            [('+', second)] => self.first.checked_add(*second),
            [(_, second)] => self.first.checked_sub(*second),
            _ => {
                return Err(syntax(
                    line,
                    self.pos,
                    "inline operation with more than two operands",
                ))
            }
        };
        let value = value.ok_or_else(|| syntax(line, self.pos, "literal out of range"))?;
        Ok(value as u8)
    }
}

pub fn literal(inp: Span) -> IResult<Span, Literal> {
    let (inp, pos) = position(inp)?;
    let (inp, first) = number(inp)?;
    let (inp, rest) = many0(pair(
        preceded(space0, one_of("+-")),
        preceded(space0, number),
    ))(inp)?;
    Ok((inp, Literal { pos, first, rest }))
}

/// `$` followed by a literal: a memory address.
pub fn address(inp: Span) -> IResult<Span, Literal> {
    preceded(pair(char('$'), space0), literal)(inp)
}

/// The first operand of `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource<'a> {
    Immediate(Literal<'a>),
    Memory(Literal<'a>),
}

pub fn load_source(inp: Span) -> IResult<Span, LoadSource> {
    alt((
        map(address, LoadSource::Memory),
        map(literal, LoadSource::Immediate),
    ))(inp)
}

/// `,` or `->` between two operands.
pub fn separator(inp: Span) -> IResult<Span, Span> {
    delimited(space0, alt((tag(","), tag("->"))), space0)(inp)
}

pub fn data_reg(inp: Span) -> IResult<Span, DataReg> {
    alt((
        value(DataReg::A, keyword("a")),
        value(DataReg::B, keyword("b")),
    ))(inp)
}

pub fn move_source(inp: Span) -> IResult<Span, MoveSource> {
    alt((
        value(MoveSource::A, keyword("a")),
        value(MoveSource::B, keyword("b")),
        value(MoveSource::SP, keyword("sp")),
    ))(inp)
}

pub fn move_dest(inp: Span) -> IResult<Span, MoveDest> {
    alt((
        value(MoveDest::A, keyword("a")),
        value(MoveDest::B, keyword("b")),
        value(MoveDest::X, keyword("x")),
    ))(inp)
}

/// The second operand of a two-operand ALU instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AluOperand<'a> {
    B,
    X,
    Memory(Literal<'a>),
    MemoryAtB,
    MemoryAtX,
}

pub fn alu_operand(inp: Span) -> IResult<Span, AluOperand> {
    alt((
        value(
            AluOperand::MemoryAtB,
            preceded(pair(char('$'), space0), keyword("b")),
        ),
        value(
            AluOperand::MemoryAtX,
            preceded(pair(char('$'), space0), keyword("x")),
        ),
        map(address, AluOperand::Memory),
        value(AluOperand::B, keyword("b")),
        value(AluOperand::X, keyword("x")),
    ))(inp)
}

pub fn output_kind(inp: Span) -> IResult<Span, OutputKind> {
    alt((
        value(OutputKind::Command, keyword("cmd")),
        value(OutputKind::Address, keyword("addr")),
        value(OutputKind::Data, keyword("dat")),
    ))(inp)
}

/// A jump or call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<'a> {
    Address(Literal<'a>),
    Label(Span<'a>),
}

pub fn target(inp: Span) -> IResult<Span, Target> {
    alt((
        map(address, Target::Address),
        map(terminated(literal, not(satisfy(is_word_char))), Target::Address),
        map(name, Target::Label),
    ))(inp)
}

/// One line of source split into its parts. The operand text is everything after the mnemonic
/// up to a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine<'a> {
    pub label: Option<Span<'a>>,
    pub mnemonic: Span<'a>,
    pub operands: Span<'a>,
}

fn line_parts(inp: Span) -> IResult<Span, (Option<Span>, Option<Span>)> {
    tuple((
        preceded(space0, opt(preceded(char(':'), name))),
        preceded(space0, opt(terminated(alpha1, peek(alt((space1, eof)))))),
    ))(inp)
}

/// Splits one line of source. Blank and comment-only lines give `None`.
///
/// # Errors
///
/// This function will return an error if a label is not followed by a command, or if the line
/// does not start with a command.
pub fn split_line(text: &str, line: usize) -> AResult<Option<SourceLine<'_>>> {
    let code = Span::new(text.split(COMMENT).next().unwrap_or_default());
    let (operands, (label, mnemonic)) =
        line_parts(code).map_err(|_| syntax(line, code, "expected command"))?;
    let blank = operands.fragment().trim().is_empty();
    match (label, mnemonic) {
        (None, None) if blank => Ok(None),
        (Some(label), None) if blank => Err(AsmError::MissingOperand {
            line,
            message: format!("expected command after label '{}'", label.fragment()),
        }),
        (_, None) => Err(syntax(
            line,
            operands,
            "expected 'command' or 'label' or 'comment'",
        )),
        (label, Some(mnemonic)) => Ok(Some(SourceLine {
            label,
            mnemonic,
            operands,
        })),
    }
}

/// Runs `parser` over the whole operand text, allowing trailing whitespace.
pub fn parse_operands<'a, O, F>(operands: Span<'a>, line: usize, message: &str, parser: F) -> AResult<O>
where
    F: FnMut(Span<'a>) -> IResult<Span<'a>, O>,
{
    finish(
        line,
        message,
        all_consuming(delimited(space0, parser, space0))(operands),
    )
}

/// Builds a syntax error pointing at `at`.
pub fn syntax(line: usize, at: Span, message: impl Into<String>) -> AsmError {
    AsmError::Syntax {
        line,
        column: at.get_utf8_column(),
        message: message.into(),
    }
}

fn finish<'a, O>(line: usize, message: &str, result: IResult<Span<'a>, O>) -> AResult<O> {
    match result {
        Ok((_, out)) => Ok(out),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(syntax(line, e.input, message)),
        Err(nom::Err::Incomplete(_)) => Err(AsmError::Syntax {
            line,
            column: 0,
            message: message.to_owned(),
        }),
    }
}
