//! Common platform code between SA2's other modules.

use std::fmt;

use thiserror::Error;

/// Size of the flat address space in bytes.
pub const MEMORY_SIZE: usize = 256;
/// Initial stack pointer. The stack is descending and the pointer addresses the next free slot.
pub const STACK_START: u8 = 0xFF;
/// Maximum number of bytes on the stack.
pub const STACK_SIZE: u8 = 16;

/// An error for the core platform of SA2.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
}

/// Type alias for Result<T, [PlatformError]>.
pub type PResult<T> = Result<T, PlatformError>;

bitflags::bitflags! {
    /// One cycle's command to the datapath. Each bit is a named control line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlWord: u64 {
        /// Instruction register out.
        const IO = 1 << 0;
        /// Instruction register in.
        const II = 1 << 1;
        /// Program counter out.
        const CO = 1 << 2;
        /// Program counter increment.
        const CE = 1 << 3;
        /// Program counter in (jump).
        const CI = 1 << 4;
        /// Operand register out.
        const OPO = 1 << 5;
        /// Operand register in.
        const OPI = 1 << 6;
        /// Register A out.
        const AO = 1 << 7;
        /// Register A in.
        const AI = 1 << 8;
        /// Register B out.
        const BO = 1 << 9;
        /// Register B in.
        const BI = 1 << 10;
        /// Register X out.
        const XO = 1 << 11;
        /// Register X in.
        const XI = 1 << 12;
        /// Load the constant 1 into X.
        const X1 = 1 << 13;
        /// Stack pointer out.
        const SO = 1 << 14;
        /// Stack pointer in.
        const SI = 1 << 15;
        /// Stack pointer increment.
        const SP1 = 1 << 16;
        /// Stack pointer decrement.
        const SM1 = 1 << 17;
        /// ALU mode: subtract.
        const SUB = 1 << 18;
        /// ALU mode: bitwise or.
        const OR = 1 << 19;
        /// ALU mode: bitwise exclusive or.
        const XOR = 1 << 20;
        /// ALU mode: bitwise and.
        const AND = 1 << 21;
        /// ALU mode: bitwise not.
        const NOT = 1 << 22;
        /// ALU mode: shift right.
        const BSR = 1 << 23;
        /// ALU mode: shift left.
        const BSL = 1 << 24;
        /// ALU out, flag register latches the ALU flags.
        const EO = 1 << 25;
        /// Apply the bus value as an output command.
        const OCI = 1 << 26;
        /// Output address in.
        const OAI = 1 << 27;
        /// Output data in.
        const ODI = 1 << 28;
        /// Output display register in.
        const OI = 1 << 29;
        /// Memory address pointer in.
        const MAI = 1 << 30;
        /// Memory out.
        const MO = 1 << 31;
        /// Memory in.
        const MI = 1 << 32;
        /// Halt the machine.
        const HLT = 1 << 33;
        /// Reset the micro-instruction counter after this cycle.
        const MSR = 1 << 34;
    }
}

bitflags::bitflags! {
    /// The CPU status flags, as stored positionally in the flag register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// Set if the result of the last ALU operation was zero.
        const ZERO = 1 << 0;
        /// Set if the last addition overflowed past 0xFF.
        const CARRY = 1 << 1;
        /// Mirrors the lowest bit of the last ALU result (odd result).
        const PARITY = 1 << 2;
    }
}

/// The named registers of SA2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    A,
    B,
    X,
    /// Stack pointer
    SP,
    /// Instruction register (not readable)
    IP,
    /// Operand register
    OP,
    /// Program counter
    PC,
    /// ALU result register
    ALU,
    /// Flag register (not readable)
    FR,
    /// Number display (not readable)
    OUT,
    /// Memory address pointer
    MA,
    /// Output bus address
    OA,
}

impl Register {
    pub const ALL: [Register; 12] = [
        Self::A,
        Self::B,
        Self::X,
        Self::SP,
        Self::IP,
        Self::OP,
        Self::PC,
        Self::ALU,
        Self::FR,
        Self::OUT,
        Self::MA,
        Self::OA,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::X => "X",
            Self::SP => "SP",
            Self::IP => "IP",
            Self::OP => "OP",
            Self::PC => "PC",
            Self::ALU => "ALU",
            Self::FR => "FR",
            Self::OUT => "OUT",
            Self::MA => "MA",
            Self::OA => "OA",
        }
    }

    /// Looks a register up by its (case-insensitive) name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The ALU's mode of operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluMode {
    #[default]
    Add,
    Sub,
    Or,
    Xor,
    And,
    Not,
    Shl,
    Shr,
}

impl AluMode {
    /// The control line selecting this mode. Addition is the default and has none.
    pub const fn control_line(self) -> ControlWord {
        match self {
            Self::Add => ControlWord::empty(),
            Self::Sub => ControlWord::SUB,
            Self::Or => ControlWord::OR,
            Self::Xor => ControlWord::XOR,
            Self::And => ControlWord::AND,
            Self::Not => ControlWord::NOT,
            Self::Shl => ControlWord::BSL,
            Self::Shr => ControlWord::BSR,
        }
    }

    /// Selects the mode a control word asks for. If several mode lines are set, the first in
    /// the order SUB, OR, XOR, AND, NOT, BSL, BSR wins.
    pub fn from_word(word: ControlWord) -> Self {
        [
            Self::Sub,
            Self::Or,
            Self::Xor,
            Self::And,
            Self::Not,
            Self::Shl,
            Self::Shr,
        ]
        .into_iter()
        .find(|mode| word.contains(mode.control_line()))
        .unwrap_or(Self::Add)
    }
}

/// The two registers that load, store, push and pop operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataReg {
    A,
    B,
}

impl DataReg {
    const fn bit(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// Source register of a `move`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveSource {
    A,
    B,
    SP,
}

/// Destination register of a `move`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveDest {
    A,
    B,
    X,
}

impl MoveSource {
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::SP => "sp",
        }
    }
}

impl MoveDest {
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::X => "x",
        }
    }
}

/// The two-operand ALU instructions. The first operand is always A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Or,
    Xor,
    And,
}

impl BinaryOp {
    pub const fn mode(self) -> AluMode {
        match self {
            Self::Add => AluMode::Add,
            Self::Sub => AluMode::Sub,
            Self::Or => AluMode::Or,
            Self::Xor => AluMode::Xor,
            Self::And => AluMode::And,
        }
    }

    const fn base(self) -> u8 {
        match self {
            Self::Add => 0x30,
            Self::Sub => 0x40,
            Self::Or => 0x50,
            Self::Xor => 0x60,
            Self::And => 0x70,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::And => "and",
        }
    }
}

/// Where the second ALU operand comes from. The discriminant is the opcode's low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluSource {
    /// Register B
    B = 0,
    /// Register X
    X = 1,
    /// Memory at the operand
    Memory = 2,
    /// Memory at the address in B
    MemoryAtB = 3,
    /// Memory at the address in X
    MemoryAtX = 4,
}

/// The single-operand ALU instructions, all working on A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Shl,
    Shr,
    /// `A <- A + 1`, through the ALU with X forced to 1.
    Inc,
    /// `A <- A - 1`, through the ALU with X forced to 1.
    Dec,
}

impl UnaryOp {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Shl => "bitsl",
            Self::Shr => "bitsr",
            Self::Inc => "inc",
            Self::Dec => "dec",
        }
    }
}

/// Which part of the output bus an `out` instruction addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Command,
    Address,
    Data,
}

impl OutputKind {
    const fn offset(self) -> u8 {
        match self {
            Self::Command => 1,
            Self::Address => 2,
            Self::Data => 3,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Command => "cmd",
            Self::Address => "addr",
            Self::Data => "dat",
        }
    }
}

/// Jump conditions. The discriminant is the opcode's low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Condition {
    Always = 0,
    Carry = 1,
    NoCarry = 2,
    Zero = 3,
    NotZero = 4,
    Parity = 5,
    NoParity = 6,
}

impl Condition {
    /// Evaluates the condition against a flag register value.
    pub const fn holds(self, flags: Flags) -> bool {
        match self {
            Self::Always => true,
            Self::Carry => flags.contains(Flags::CARRY),
            Self::NoCarry => !flags.contains(Flags::CARRY),
            Self::Zero => flags.contains(Flags::ZERO),
            Self::NotZero => !flags.contains(Flags::ZERO),
            Self::Parity => flags.contains(Flags::PARITY),
            Self::NoParity => !flags.contains(Flags::PARITY),
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Always => "jmp",
            Self::Carry => "jmpc",
            Self::NoCarry => "jmpnc",
            Self::Zero => "jmpz",
            Self::NotZero => "jmpnz",
            Self::Parity => "jmpp",
            Self::NoParity => "jmpnp",
        }
    }
}

/// The machine instructions of SA2.
///
/// Opcodes are partitioned by high nibble:
///
/// - `0x1x` load, `0x2x` store and register moves
/// - `0x3x`-`0x7x` two-operand ALU, low nibble selects the operand source
/// - `0x8x` unary ALU, `0x9x` output, `0xAx` jumps/call/return, `0xBx` stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Stops the clock
    Halt,
    /// `reg <- mem[operand]`
    LoadMem(DataReg),
    /// `reg <- operand`
    LoadImm(DataReg),
    /// `mem[operand] <- reg`
    Store(DataReg),
    /// `dest <- src`
    Move(MoveSource, MoveDest),
    /// Exchanges A and B, overwriting X.
    Swap,
    /// `A <- A (op) source`
    Alu(BinaryOp, AluSource),
    /// `A <- (op) A`
    Unary(UnaryOp),
    /// `OUT <- A`
    Display,
    /// Sends the operand to the output bus.
    Output(OutputKind),
    /// Memory-indirect output. Encoded by the assembler but without a micro-program.
    OutputIndirect(OutputKind),
    /// `PC <- operand` if the condition holds
    Jump(Condition),
    /// Pushes PC and jumps to the operand.
    Call,
    /// Pops PC.
    Return,
    /// `mem[SP] <- reg; SP -= 1`
    Push(DataReg),
    /// `SP += 1; reg <- mem[SP]`
    Pop(DataReg),
    /// `SP <- operand`
    StackReset,
}

impl Opcode {
    /// Generates the opcode byte.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Halt => 0x01,
            Self::LoadMem(reg) => 0x10 | reg.bit(),
            Self::LoadImm(reg) => 0x12 | reg.bit(),
            Self::Store(reg) => 0x20 | reg.bit(),
            Self::Move(src, dest) => {
                let base = match src {
                    MoveSource::A => 0x22,
                    MoveSource::B => 0x25,
                    MoveSource::SP => 0x28,
                };
                let offset = match dest {
                    MoveDest::A => 0,
                    MoveDest::B => 1,
                    MoveDest::X => 2,
                };
                base + offset
            }
            Self::Swap => 0x2B,
            Self::Alu(op, source) => op.base() | source as u8,
            Self::Unary(op) => match op {
                UnaryOp::Not => 0x81,
                UnaryOp::Shl => 0x82,
                UnaryOp::Shr => 0x83,
                UnaryOp::Inc => 0x84,
                UnaryOp::Dec => 0x85,
            },
            Self::Display => 0x90,
            Self::Output(kind) => 0x90 + kind.offset(),
            Self::OutputIndirect(kind) => 0x93 + kind.offset(),
            Self::Jump(cond) => 0xA0 | cond as u8,
            Self::Call => 0xA7,
            Self::Return => 0xA8,
            Self::Push(reg) => 0xB0 + 2 * reg.bit(),
            Self::Pop(reg) => 0xB1 + 2 * reg.bit(),
            Self::StackReset => 0xB4,
        }
    }

    /// Decodes an opcode byte. Bytes without an instruction give `None`; this includes the
    /// self-moves `0x22` and `0x26` that [`Opcode::to_byte`] can produce.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        use AluSource::*;
        const BINARY: [BinaryOp; 5] = [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Or,
            BinaryOp::Xor,
            BinaryOp::And,
        ];
        let op = match byte {
            0x01 => Self::Halt,
            0x10 => Self::LoadMem(DataReg::A),
            0x11 => Self::LoadMem(DataReg::B),
            0x12 => Self::LoadImm(DataReg::A),
            0x13 => Self::LoadImm(DataReg::B),
            0x20 => Self::Store(DataReg::A),
            0x21 => Self::Store(DataReg::B),
            0x23 => Self::Move(MoveSource::A, MoveDest::B),
            0x24 => Self::Move(MoveSource::A, MoveDest::X),
            0x25 => Self::Move(MoveSource::B, MoveDest::A),
            0x27 => Self::Move(MoveSource::B, MoveDest::X),
            0x28 => Self::Move(MoveSource::SP, MoveDest::A),
            0x29 => Self::Move(MoveSource::SP, MoveDest::B),
            0x2A => Self::Move(MoveSource::SP, MoveDest::X),
            0x2B => Self::Swap,
            0x30..=0x7F if byte & 0x0F <= 4 => {
                let op = BINARY[((byte >> 4) - 3) as usize];
                let source = match byte & 0x0F {
                    0 => B,
                    1 => X,
                    2 => Memory,
                    3 => MemoryAtB,
                    _ => MemoryAtX,
                };
                Self::Alu(op, source)
            }
            0x81 => Self::Unary(UnaryOp::Not),
            0x82 => Self::Unary(UnaryOp::Shl),
            0x83 => Self::Unary(UnaryOp::Shr),
            0x84 => Self::Unary(UnaryOp::Inc),
            0x85 => Self::Unary(UnaryOp::Dec),
            0x90 => Self::Display,
            0x91 => Self::Output(OutputKind::Command),
            0x92 => Self::Output(OutputKind::Address),
            0x93 => Self::Output(OutputKind::Data),
            0x94 => Self::OutputIndirect(OutputKind::Command),
            0x95 => Self::OutputIndirect(OutputKind::Address),
            0x96 => Self::OutputIndirect(OutputKind::Data),
            0xA0 => Self::Jump(Condition::Always),
            0xA1 => Self::Jump(Condition::Carry),
            0xA2 => Self::Jump(Condition::NoCarry),
            0xA3 => Self::Jump(Condition::Zero),
            0xA4 => Self::Jump(Condition::NotZero),
            0xA5 => Self::Jump(Condition::Parity),
            0xA6 => Self::Jump(Condition::NoParity),
            0xA7 => Self::Call,
            0xA8 => Self::Return,
            0xB0 => Self::Push(DataReg::A),
            0xB1 => Self::Pop(DataReg::A),
            0xB2 => Self::Push(DataReg::B),
            0xB3 => Self::Pop(DataReg::B),
            0xB4 => Self::StackReset,
            _ => return None,
        };
        Some(op)
    }

    /// Whether the operand byte following this opcode is used.
    pub const fn has_operand(self) -> bool {
        matches!(
            self,
            Self::LoadMem(_)
                | Self::LoadImm(_)
                | Self::Store(_)
                | Self::Alu(_, AluSource::Memory)
                | Self::Output(_)
                | Self::OutputIndirect(_)
                | Self::Jump(_)
                | Self::Call
                | Self::StackReset
        )
    }
}

impl TryFrom<u8> for Opcode {
    type Error = PlatformError;

    fn try_from(value: u8) -> PResult<Self> {
        Self::from_byte(value).ok_or(PlatformError::InvalidOpcode(value))
    }
}

/// A full machine instruction: opcode byte plus operand byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub op: Opcode,
    pub operand: u8,
}

impl Instruction {
    pub fn new(op: Opcode, operand: u8) -> Self {
        Self { op, operand }
    }

    /// Generates the `(opcode, operand)` byte pair. The operand is 0 for operand-less opcodes.
    pub fn to_bytes(self) -> [u8; 2] {
        let operand = if self.op.has_operand() {
            self.operand
        } else {
            0
        };
        [self.op.to_byte(), operand]
    }

    /// Generates an [Instruction] from an `(opcode, operand)` byte pair.
    ///
    /// # Errors
    ///
    /// This function will return an error if the opcode byte is not a valid instruction.
    pub fn from_bytes(bytes: [u8; 2]) -> PResult<Self> {
        Ok(Self {
            op: bytes[0].try_into()?,
            operand: bytes[1],
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.operand;
        match self.op {
            Opcode::Halt => write!(f, "halt"),
            Opcode::LoadMem(reg) => write!(f, "load ${n} -> {}", reg.name()),
            Opcode::LoadImm(reg) => write!(f, "load {n} -> {}", reg.name()),
            Opcode::Store(reg) => write!(f, "store {} -> ${n}", reg.name()),
            Opcode::Move(src, dest) => write!(f, "move {},{}", src.name(), dest.name()),
            Opcode::Swap => write!(f, "swap"),
            Opcode::Alu(op, source) => {
                let op = op.mnemonic();
                match source {
                    AluSource::B => write!(f, "{op} b"),
                    AluSource::X => write!(f, "{op} x"),
                    AluSource::Memory => write!(f, "{op} ${n}"),
                    AluSource::MemoryAtB => write!(f, "{op} $b"),
                    AluSource::MemoryAtX => write!(f, "{op} $x"),
                }
            }
            Opcode::Unary(op) => f.write_str(op.mnemonic()),
            Opcode::Display => write!(f, "out"),
            Opcode::Output(kind) => write!(f, "out {} {n}", kind.keyword()),
            Opcode::OutputIndirect(kind) => write!(f, "out {} ${n}", kind.keyword()),
            Opcode::Jump(cond) => write!(f, "{} ${n}", cond.mnemonic()),
            Opcode::Call => write!(f, "call ${n}"),
            Opcode::Return => write!(f, "return"),
            Opcode::Push(reg) => write!(f, "push {}", reg.name()),
            Opcode::Pop(reg) => write!(f, "pop {}", reg.name()),
            Opcode::StackReset => write!(f, "stkrest"),
        }
    }
}

/// Renders an `(opcode, operand)` pair as assembly text, falling back to raw bytes for
/// opcodes without an instruction.
pub fn disassemble(opcode: u8, operand: u8) -> String {
    match Instruction::from_bytes([opcode, operand]) {
        Ok(instr) => instr.to_string(),
        Err(_) => format!(".byte {opcode:#04x}, {operand:#04x}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_encode() {
        assert_eq!(Opcode::LoadImm(DataReg::A).to_byte(), 0x12);
        assert_eq!(Opcode::LoadMem(DataReg::B).to_byte(), 0x11);
        assert_eq!(Opcode::Alu(BinaryOp::Xor, AluSource::MemoryAtX).to_byte(), 0x64);
        assert_eq!(Opcode::Move(MoveSource::SP, MoveDest::X).to_byte(), 0x2A);
        assert_eq!(Opcode::Move(MoveSource::A, MoveDest::A).to_byte(), 0x22);
        assert_eq!(Opcode::OutputIndirect(OutputKind::Data).to_byte(), 0x96);
        assert_eq!(Opcode::Pop(DataReg::B).to_byte(), 0xB3);
        assert_eq!(Opcode::Jump(Condition::NoParity).to_byte(), 0xA6);
    }

    #[test]
    fn test_opcode_decode_matches_encode() {
        for byte in 0..=u8::MAX {
            if let Some(op) = Opcode::from_byte(byte) {
                assert_eq!(op.to_byte(), byte, "{op:?}");
            }
        }
        assert_eq!(Opcode::from_byte(0x22), None);
        assert_eq!(Opcode::from_byte(0x35), None);
        assert_eq!(Opcode::try_from(0x00), Err(PlatformError::InvalidOpcode(0x00)));
    }

    #[test]
    fn test_instruction_bytes() {
        let instr = Instruction::new(Opcode::LoadImm(DataReg::A), 5);
        assert_eq!(instr.to_bytes(), [0x12, 0x05]);
        // operand is a don't-care zero for operand-less opcodes
        let instr = Instruction::new(Opcode::Halt, 9);
        assert_eq!(instr.to_bytes(), [0x01, 0x00]);
        let instr = Instruction::from_bytes([0xA7, 0x10]).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Call, 0x10));
    }

    #[test]
    fn test_disassemble() {
        assert_eq!(disassemble(0x12, 5), "load 5 -> a");
        assert_eq!(disassemble(0x42, 7), "sub $7");
        assert_eq!(disassemble(0xA3, 3), "jmpz $3");
        assert_eq!(disassemble(0x00, 0), ".byte 0x00, 0x00");
    }

    #[test]
    fn test_alu_mode_from_word() {
        assert_eq!(AluMode::from_word(ControlWord::EO), AluMode::Add);
        assert_eq!(AluMode::from_word(ControlWord::NOT | ControlWord::EO), AluMode::Not);
        assert_eq!(AluMode::from_word(ControlWord::BSR), AluMode::Shr);
        assert_eq!(AluMode::from_word(ControlWord::SUB | ControlWord::OR), AluMode::Sub);
    }

    #[test]
    fn test_register_from_name() {
        assert_eq!(Register::from_name("sp"), Some(Register::SP));
        assert_eq!(Register::from_name("OUT"), Some(Register::OUT));
        assert_eq!(Register::from_name("q"), None);
    }

    #[test]
    fn test_condition() {
        assert!(Condition::Always.holds(Flags::empty()));
        assert!(!Condition::Zero.holds(Flags::CARRY));
        assert!(Condition::NotZero.holds(Flags::CARRY));
        assert!(Condition::Parity.holds(Flags::PARITY | Flags::ZERO));
    }
}
