use crate::plat::{AluMode, Flags};

use super::{
    bus::Bus,
    registers::{BusAction, BusConnectable, Register},
    EResult,
};

/// Performs one ALU operation on two bytes.
///
/// All arithmetic wraps at 8 bits. Carry is only produced by addition, zero is set for a zero
/// result and parity mirrors the result's lowest bit. The unary modes ignore `right`.
pub fn compute(mode: AluMode, left: u8, right: u8) -> (u8, Flags) {
    let mut flags = Flags::empty();
    let result = match mode {
        AluMode::Add => {
            let (result, overflow) = left.overflowing_add(right);
            flags.set(Flags::CARRY, overflow);
            result
        }
        AluMode::Sub => left.wrapping_sub(right),
        AluMode::Or => left | right,
        AluMode::Xor => left ^ right,
        AluMode::And => left & right,
        AluMode::Not => !left,
        AluMode::Shl => left << 1,
        AluMode::Shr => left >> 1,
    };
    flags.set(Flags::ZERO, result == 0);
    flags.set(Flags::PARITY, result & 0x01 == 1);
    (result, flags)
}

/// The ALU (Arithmetic and Logic Unit) of SA2, seen as a register holding the last result.
#[derive(Debug, Clone)]
pub struct AluRegister {
    reg: Register,
    mode: AluMode,
}

impl AluRegister {
    /// Creates a new [`AluRegister`] in addition mode.
    pub fn new() -> Self {
        Self {
            reg: Register::new("ALU", true),
            mode: AluMode::Add,
        }
    }

    pub fn mode(&self) -> AluMode {
        self.mode
    }

    /// Sets the mode for the current cycle. It falls back to addition when the cycle ends.
    pub fn set_mode(&mut self, mode: AluMode) {
        self.mode = mode;
    }

    pub fn value(&self) -> u8 {
        self.reg.value()
    }

    pub fn set(&mut self, value: u8) {
        self.reg.set(value);
    }

    /// Computes `left (mode) right`, caching the result so it can be transmitted this cycle.
    pub fn compute(&mut self, left: u8, right: u8) -> (u8, Flags) {
        let (result, flags) = compute(self.mode, left, right);
        self.reg.set(result);
        (result, flags)
    }

    /// Ends the cycle without a bus action.
    pub fn clock(&mut self) {
        self.mode = AluMode::Add;
    }

    pub fn reset(&mut self) {
        self.reg.reset(0);
        self.mode = AluMode::Add;
    }
}

impl Default for AluRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl BusConnectable for AluRegister {
    fn mark_transmit(&mut self) -> EResult<()> {
        self.reg.mark_transmit()
    }

    fn mark_receive(&mut self) {
        self.reg.mark_receive()
    }

    fn resolve_cycle(&mut self, bus: &mut Bus) -> EResult<()> {
        let result = self.reg.resolve_cycle(bus);
        self.mode = AluMode::Add;
        result
    }

    fn bus_action(&self) -> BusAction {
        self.reg.bus_action()
    }

    fn unmark(&mut self) {
        self.reg.unmark();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [AluMode; 8] = [
        AluMode::Add,
        AluMode::Sub,
        AluMode::Or,
        AluMode::Xor,
        AluMode::And,
        AluMode::Not,
        AluMode::Shl,
        AluMode::Shr,
    ];

    #[test]
    fn test_compute_is_pure() {
        let mut alu = AluRegister::new();
        for mode in MODES {
            alu.set_mode(mode);
            for (a, b) in [(0, 0), (1, 255), (200, 100), (0x80, 0x7F), (13, 13)] {
                assert_eq!(alu.compute(a, b), alu.compute(a, b));
                assert_eq!(alu.mode(), mode);
            }
        }
    }

    #[test]
    fn test_carry_only_on_addition_overflow() {
        for a in 0..=u8::MAX {
            for b in 0..=u8::MAX {
                let (_, flags) = compute(AluMode::Add, a, b);
                assert_eq!(
                    flags.contains(Flags::CARRY),
                    a as u16 + b as u16 > 0xFF,
                    "{a} + {b}"
                );
                let (_, flags) = compute(AluMode::Sub, a, b);
                assert!(!flags.contains(Flags::CARRY));
            }
        }
    }

    #[test]
    fn test_zero_flag_iff_result_zero() {
        for mode in MODES {
            for a in (0..=u8::MAX).step_by(7) {
                for b in [0u8, 1, 0x55, 0x80, 0xFF, a] {
                    let (result, flags) = compute(mode, a, b);
                    assert_eq!(flags.contains(Flags::ZERO), result == 0, "{mode:?} {a} {b}");
                    assert_eq!(flags.contains(Flags::PARITY), result & 1 == 1);
                }
            }
        }
    }

    #[test]
    fn test_operations() {
        assert_eq!(compute(AluMode::Add, 200, 100).0, 44);
        assert_eq!(compute(AluMode::Sub, 3, 5).0, 0xFE);
        assert_eq!(compute(AluMode::Or, 0b1010, 0b0101).0, 0b1111);
        assert_eq!(compute(AluMode::Xor, 0xFF, 0x0F).0, 0xF0);
        assert_eq!(compute(AluMode::And, 0xF3, 0x3F).0, 0x33);
        assert_eq!(compute(AluMode::Not, 0x0F, 0xAA).0, 0xF0);
        assert_eq!(compute(AluMode::Shl, 0x81, 0).0, 0x02);
        // logical shift, no sign extension
        assert_eq!(compute(AluMode::Shr, 0x81, 0).0, 0x40);
    }

    #[test]
    fn test_mode_resets_after_cycle() {
        let mut bus = Bus::new();
        let mut alu = AluRegister::new();
        alu.set_mode(AluMode::Xor);
        alu.compute(0x0F, 0xFF);
        alu.mark_transmit().unwrap();
        alu.resolve_cycle(&mut bus).unwrap();
        assert_eq!(bus.receive(), Ok(0xF0));
        assert_eq!(alu.mode(), AluMode::Add);

        alu.set_mode(AluMode::Sub);
        alu.clock();
        assert_eq!(alu.mode(), AluMode::Add);
    }
}
