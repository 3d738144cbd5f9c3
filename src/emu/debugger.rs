use std::cell::RefCell;

use anyhow::{Context, Result};
use easy_repl::{command, repl::LoopStatus, CommandStatus, Repl};

use crate::plat::Register;

use super::emulator::{EmuState, Emulator};

/// Parses a byte address: `0x..` or `$..` for hexadecimal, decimal otherwise.
pub fn parse_address(text: &str) -> Result<u8> {
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'));
    let addr = match hex {
        Some(digits) => u8::from_str_radix(digits, 16),
        None => text.parse::<u8>(),
    };
    addr.with_context(|| format!("invalid address `{text}`"))
}

pub struct Debugger<'a> {
    pub emu: RefCell<&'a mut Emulator>,
}

impl<'a> Debugger<'a> {
    pub fn new(emu: &'a mut Emulator) -> Self {
        Self {
            emu: RefCell::new(emu),
        }
    }

    pub fn repl(&self) -> Result<()> {
        let mut repl = Repl::builder()
            .description("SA2 Debug REPL")
            .add(
                "c",
                command! {
                    "Continue execution",
                    () => || {
                        self.emu.borrow_mut().state = EmuState::Continue;
                        Ok(CommandStatus::Quit)
                    }
                },
            )
            .add(
                "s",
                command! {
                    "Step one instruction",
                    () => || {
                        self.emu.borrow_mut().step_instr()?;
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "ms",
                command! {
                    "Step one clock cycle",
                    () => || {
                        let mut emu = self.emu.borrow_mut();
                        emu.microstep()?;
                        eprintln!(
                            "micro-step {}, bus={:02X}",
                            emu.machine.micro_counter(),
                            emu.machine.last_bus_value()
                        );
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "bt",
                command! {
                    "Print last X instructions executed",
                    (x:usize) => |x| {
                        let emu = self.emu.borrow();
                        for entry in emu.instr_history.iter().rev().take(x).rev() {
                            eprintln!("{}", entry);
                        }
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "b",
                command! {
                    "Toggle a breakpoint at an address",
                    (addr:String) => |addr: String| {
                        let addr = parse_address(&addr)?;
                        let mut emu = self.emu.borrow_mut();
                        if emu.breakpoints.remove(&addr) {
                            eprintln!("removed breakpoint at {addr:#04x}");
                        } else {
                            emu.breakpoints.insert(addr);
                            eprintln!("breakpoint at {addr:#04x}");
                        }
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "pr",
                command! {
                    "Print the value of all registers",
                    () => || {
                        let emu = self.emu.borrow();
                        for reg in Register::ALL {
                            eprintln!("{}={:02X}", reg, emu.machine.register(reg));
                        }
                        eprintln!("flags={:?}", emu.machine.flags());
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "reg",
                command! {
                    "Print the value of one register",
                    (name:String) => |name: String| {
                        let reg = Register::from_name(&name)
                            .with_context(|| format!("unknown register `{name}`"))?;
                        eprintln!("{}={:02X}", reg, self.emu.borrow().machine.register(reg));
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "set",
                command! {
                    "Set a register to a value",
                    (name:String, value:String) => |name: String, value: String| {
                        let reg = Register::from_name(&name)
                            .with_context(|| format!("unknown register `{name}`"))?;
                        let value = parse_address(&value)?;
                        self.emu.borrow_mut().machine.set_register(reg, value);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "peek",
                command! {
                    "Peek a value from memory",
                    (addr:String) => |addr: String| {
                        let emu = self.emu.borrow();
                        let addr = parse_address(&addr)?;
                        let val = emu.machine.memory()[addr as usize];
                        eprintln!("{:02X}={:02X}", addr, val);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "lcd",
                command! {
                    "Show the output displays",
                    () => || {
                        eprint!("{}", self.emu.borrow().machine.output().render());
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "halt",
                command! {
                    "Halt execution",
                    () => || {
                        self.emu.borrow_mut().state = EmuState::Halt;
                        Ok(CommandStatus::Quit)
                    }
                },
            )
            .build()?;
        eprintln!("SA2 Debug REPL");
        'repl: loop {
            eprintln!();
            {
                let emu = self.emu.borrow();
                if let Some(entry) = emu.instr_history.back() {
                    eprintln!("Current instruction:\n{}", entry);
                }
            }

            let status = repl.next()?;
            if let LoopStatus::Break = status {
                break 'repl;
            }
            {
                let emu = self.emu.borrow();
                if emu.state != EmuState::Pause {
                    break 'repl;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("200").unwrap(), 200);
        assert_eq!(parse_address("0xff").unwrap(), 0xFF);
        assert_eq!(parse_address("$1A").unwrap(), 0x1A);
        assert!(parse_address("256").is_err());
        assert!(parse_address("zz").is_err());
    }
}
