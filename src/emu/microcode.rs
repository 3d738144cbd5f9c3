//! Micro-programs and the opcode decode table.

use crate::plat::{
    AluSource, Condition, ControlWord, DataReg, Flags, MoveDest, MoveSource, Opcode, OutputKind,
    UnaryOp,
};

/// Combines control lines into a [`ControlWord`], usable in const context.
macro_rules! word {
    ($($line:ident)|+) => {
        ControlWord::empty()$(.union(ControlWord::$line))+
    };
}

/// Maximum number of words an opcode's micro-program may have.
pub const MAX_PROGRAM_LEN: usize = 4;

/// The von Neumann fetch cycle that precedes every instruction: opcode into IP, operand into
/// OP, advancing PC past both.
pub const FETCH_CYCLE: [ControlWord; 4] = [
    word!(CO | MAI),
    word!(MO | II | CE),
    word!(CO | MAI),
    word!(MO | OPI | CE),
];

/// Up to four control words, stored inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Words {
    seq: [ControlWord; MAX_PROGRAM_LEN],
    len: u8,
}

impl Words {
    pub const EMPTY: Self = Self::new(&[]);

    pub const fn new(words: &[ControlWord]) -> Self {
        let mut seq = [ControlWord::empty(); MAX_PROGRAM_LEN];
        let mut i = 0;
        while i < words.len() {
            seq[i] = words[i];
            i += 1;
        }
        Self {
            seq,
            len: words.len() as u8,
        }
    }

    pub fn as_slice(&self) -> &[ControlWord] {
        &self.seq[..self.len as usize]
    }
}

/// The micro-program descriptor of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroProgram {
    /// Runs unconditionally.
    Always(Words),
    /// Runs only if the condition holds for the flag register at decode time, otherwise the
    /// instruction is empty.
    When(Condition, Words),
}

impl MicroProgram {
    /// The words to run given the current flags. Without the sequence reset line.
    pub fn words(&self, flags: Flags) -> &[ControlWord] {
        match self {
            Self::Always(words) => words.as_slice(),
            Self::When(cond, words) if cond.holds(flags) => words.as_slice(),
            Self::When(..) => &[],
        }
    }
}

const fn always(words: &[ControlWord]) -> MicroProgram {
    MicroProgram::Always(Words::new(words))
}

const fn transmit(reg: DataReg) -> ControlWord {
    match reg {
        DataReg::A => ControlWord::AO,
        DataReg::B => ControlWord::BO,
    }
}

const fn receive(reg: DataReg) -> ControlWord {
    match reg {
        DataReg::A => ControlWord::AI,
        DataReg::B => ControlWord::BI,
    }
}

const fn program_for(op: Opcode) -> MicroProgram {
    match op {
        Opcode::Halt => always(&[word!(HLT)]),
        Opcode::LoadMem(reg) => always(&[word!(OPO | MAI), word!(MO).union(receive(reg))]),
        Opcode::LoadImm(reg) => always(&[word!(OPO).union(receive(reg))]),
        Opcode::Store(reg) => always(&[word!(OPO | MAI), transmit(reg).union(ControlWord::MI)]),
        Opcode::Move(src, dest) => {
            let src = match src {
                MoveSource::A => ControlWord::AO,
                MoveSource::B => ControlWord::BO,
                MoveSource::SP => ControlWord::SO,
            };
            let dest = match dest {
                MoveDest::A => ControlWord::AI,
                MoveDest::B => ControlWord::BI,
                MoveDest::X => ControlWord::XI,
            };
            always(&[src.union(dest)])
        }
        Opcode::Swap => always(&[word!(AO | XI), word!(BO | AI), word!(XO | BI)]),
        Opcode::Alu(op, source) => {
            // A (op) X into A, latching the flags
            let compute = op.mode().control_line().union(word!(EO | AI));
            match source {
                AluSource::B => always(&[word!(BO | XI), compute]),
                AluSource::X => always(&[compute]),
                AluSource::Memory => always(&[word!(OPO | MAI), word!(MO | XI), compute]),
                AluSource::MemoryAtB => always(&[word!(BO | MAI), word!(MO | XI), compute]),
                AluSource::MemoryAtX => always(&[word!(XO | MAI), word!(MO | XI), compute]),
            }
        }
        Opcode::Unary(op) => always(&[match op {
            UnaryOp::Not => word!(NOT | EO | AI),
            UnaryOp::Shl => word!(BSL | EO | AI),
            UnaryOp::Shr => word!(BSR | EO | AI),
            UnaryOp::Inc => word!(X1 | EO | AI),
            UnaryOp::Dec => word!(X1 | SUB | EO | AI),
        }]),
        Opcode::Display => always(&[word!(AO | OI)]),
        Opcode::Output(kind) => always(&[ControlWord::OPO.union(match kind {
            OutputKind::Command => ControlWord::OCI,
            OutputKind::Address => ControlWord::OAI,
            OutputKind::Data => ControlWord::ODI,
        })]),
        Opcode::OutputIndirect(_) => always(&[]),
        Opcode::Jump(Condition::Always) => always(&[word!(OPO | CI)]),
        Opcode::Jump(cond) => MicroProgram::When(cond, Words::new(&[word!(OPO | CI)])),
        Opcode::Call => always(&[word!(SO | MAI), word!(CO | MI | SM1), word!(OPO | CI)]),
        Opcode::Return => always(&[word!(SP1), word!(SO | MAI), word!(MO | CI)]),
        Opcode::Push(reg) => always(&[word!(SO | MAI), transmit(reg).union(word!(MI | SM1))]),
        Opcode::Pop(reg) => always(&[word!(SP1), word!(SO | MAI), ControlWord::MO.union(receive(reg))]),
        Opcode::StackReset => always(&[word!(OPO | SI)]),
    }
}

const fn build_table() -> [MicroProgram; 256] {
    let mut table = [MicroProgram::Always(Words::EMPTY); 256];
    let mut byte = 0;
    while byte < table.len() {
        if let Some(op) = Opcode::from_byte(byte as u8) {
            table[byte] = program_for(op);
        }
        byte += 1;
    }
    table
}

/// Micro-program of every opcode byte. Bytes without an instruction map to an empty program.
pub static DECODE_TABLE: [MicroProgram; 256] = build_table();

/// Expands an opcode into the control words that execute it, with the sequence reset line on
/// the last word. An empty program (unknown opcode, or a conditional jump whose condition
/// fails) becomes a lone reset word.
pub fn decode(opcode: u8, flags: Flags) -> Vec<ControlWord> {
    let mut program = DECODE_TABLE[opcode as usize].words(flags).to_vec();
    match program.last_mut() {
        Some(last) => *last |= ControlWord::MSR,
        None => program.push(ControlWord::MSR),
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAG_SETS: [Flags; 4] = [
        Flags::empty(),
        Flags::ZERO,
        Flags::CARRY,
        Flags::PARITY.union(Flags::CARRY),
    ];

    #[test]
    fn test_program_shape() {
        for opcode in 0..=u8::MAX {
            for flags in FLAG_SETS {
                let program = decode(opcode, flags);
                assert!((1..=MAX_PROGRAM_LEN).contains(&program.len()), "{opcode:#04x}");
                let (last, rest) = program.split_last().unwrap();
                assert!(last.contains(ControlWord::MSR));
                assert!(rest.iter().all(|w| !w.contains(ControlWord::MSR)));
            }
        }
    }

    #[test]
    fn test_fetch_never_resets() {
        assert!(FETCH_CYCLE.iter().all(|w| !w.contains(ControlWord::MSR)));
    }

    #[test]
    fn test_conditional_jump() {
        assert_eq!(decode(0xA3, Flags::empty()), vec![ControlWord::MSR]);
        assert_eq!(decode(0xA3, Flags::ZERO), vec![word!(OPO | CI | MSR)]);
        assert_eq!(decode(0xA4, Flags::ZERO), vec![ControlWord::MSR]);
        assert_eq!(decode(0xA1, Flags::CARRY), vec![word!(OPO | CI | MSR)]);
        assert_eq!(decode(0xA0, Flags::empty()), vec![word!(OPO | CI | MSR)]);
    }

    #[test]
    fn test_unknown_and_halt() {
        assert_eq!(decode(0x00, Flags::empty()), vec![ControlWord::MSR]);
        assert_eq!(decode(0xFF, Flags::empty()), vec![ControlWord::MSR]);
        assert_eq!(decode(0x95, Flags::empty()), vec![ControlWord::MSR]);
        assert_eq!(decode(0x01, Flags::empty()), vec![word!(HLT | MSR)]);
    }

    #[test]
    fn test_selected_programs() {
        assert_eq!(
            decode(0x10, Flags::empty()),
            vec![word!(OPO | MAI), word!(MO | AI | MSR)]
        );
        assert_eq!(
            decode(0x34, Flags::empty()),
            vec![word!(XO | MAI), word!(MO | XI), word!(EO | AI | MSR)]
        );
        assert_eq!(decode(0x83, Flags::empty()), vec![word!(BSR | EO | AI | MSR)]);
        assert_eq!(
            decode(0xB3, Flags::empty()),
            vec![word!(SP1), word!(SO | MAI), word!(MO | BI | MSR)]
        );
    }
}
