use std::{collections::VecDeque, fmt, time::Duration};

use anyhow::{bail, ensure, Result};
use rustc_hash::FxHashSet;
use tokio::{
    runtime::{Builder, Runtime},
    time::{interval, Interval},
};

use crate::plat::{disassemble, Register};

use super::{debugger::Debugger, machine::Machine, microcode::FETCH_CYCLE};

/// How many executed instructions the history keeps.
pub const HISTORY_LEN: usize = 256;

/// The emulator's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuState {
    /// The emulator is allowed to run.
    Continue,
    /// Stops execution and hands control to the debugger, without putting the machine in a
    /// hard, unrecoverable [`Halt`][EmuState::Halt] state.
    Pause,
    /// The machine halted.
    Halt,
}

/// One decoded instruction in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Address the instruction was fetched from.
    pub pc: u8,
    pub opcode: u8,
    pub operand: u8,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[pc={:02X}] {}",
            self.pc,
            disassemble(self.opcode, self.operand)
        )
    }
}

/// The run-loop around a [`Machine`]: optional clock pacing, breakpoints, an instruction
/// history and the interactive debugger.
pub struct Emulator {
    pub machine: Machine,
    pub state: EmuState,
    pub instr_history: VecDeque<HistoryEntry>,
    pub breakpoints: FxHashSet<u8>,
    cycles: u64,
    max_cycles: Option<u64>,
    resumed_at: Option<u8>,
    clock: Option<Interval>,
    rt: Runtime,
}

impl Emulator {
    /// Wraps a loaded [`Machine`] in a new [`Emulator`]. With a clock rate, every cycle waits
    /// for the next tick of a clock running at that frequency; without one cycles run back to
    /// back.
    ///
    /// # Errors
    ///
    /// This function will return an error if the clock rate is not a positive number or if the
    /// Tokio runtime fails to initialize.
    pub fn new(machine: Machine, clock_rate_hz: Option<f64>) -> Result<Self> {
        let rt = Builder::new_current_thread()
            .enable_time()
            .global_queue_interval(1)
            .build()?;
        let clock = match clock_rate_hz {
            Some(hz) => {
                ensure!(hz.is_finite() && hz > 0.0, "invalid clock rate {hz} Hz");
                Some(rt.block_on(async { interval(Duration::from_secs_f64(hz.recip())) }))
            }
            None => None,
        };
        let state = if machine.is_halted() {
            EmuState::Halt
        } else {
            EmuState::Continue
        };
        Ok(Self {
            machine,
            state,
            instr_history: VecDeque::new(),
            breakpoints: FxHashSet::default(),
            cycles: 0,
            max_cycles: None,
            resumed_at: None,
            clock,
            rt,
        })
    }

    /// Gives up with an error once `max_cycles` cycles have run without a halt.
    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Number of cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs the emulator until it halts, entering the debugger whenever it pauses.
    pub fn run_while_continue(&mut self) -> Result<()> {
        loop {
            match self.state {
                EmuState::Continue => {
                    self.run()?;
                }
                EmuState::Halt => break,
                EmuState::Pause => {
                    self.debug()?;
                    // leaving the REPL without continuing ends the run
                    if self.state == EmuState::Pause {
                        self.state = EmuState::Halt;
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs cycles while the state is [`EmuState::Continue`]: until the machine halts or an
    /// instruction at a breakpoint is about to be fetched.
    ///
    /// # Errors
    ///
    /// Machine errors are passed through, as is running into the cycle limit.
    pub fn run(&mut self) -> Result<EmuState> {
        while self.state == EmuState::Continue {
            if self.at_breakpoint() {
                let pc = self.machine.register(Register::PC);
                log::info!("breakpoint at {pc:#04x}");
                self.resumed_at = Some(pc);
                self.state = EmuState::Pause;
                break;
            }
            if let Some(max) = self.max_cycles {
                if self.cycles >= max {
                    bail!("machine did not halt within {max} cycles");
                }
            }
            self.microstep()?;
        }
        Ok(self.state)
    }

    fn at_breakpoint(&mut self) -> bool {
        if self.machine.micro_counter() != 0 {
            return false;
        }
        let pc = self.machine.register(Register::PC);
        if self.resumed_at.take() == Some(pc) {
            return false;
        }
        self.breakpoints.contains(&pc)
    }

    /// Continues execution.
    pub fn cont(&mut self) -> Result<()> {
        if self.state != EmuState::Halt {
            self.state = EmuState::Continue;
        }
        self.run_while_continue()
    }

    /// Steps until the current instruction finishes.
    pub fn step_instr(&mut self) -> Result<()> {
        loop {
            self.microstep()?;
            if self.state == EmuState::Halt || self.machine.micro_counter() == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Steps a single CPU clock cycle.
    pub fn microstep(&mut self) -> Result<()> {
        if self.state == EmuState::Halt {
            return Ok(());
        }
        if let Some(clock) = self.clock.as_mut() {
            // snap!
            self.rt.block_on(clock.tick());
        }

        if usize::from(self.machine.micro_counter()) == FETCH_CYCLE.len() {
            // the fetch cycle moved PC past opcode and operand
            let entry = HistoryEntry {
                pc: self.machine.register(Register::PC).wrapping_sub(2),
                opcode: self.machine.register(Register::IP),
                operand: self.machine.register(Register::OP),
            };
            log::debug!(">>> {}", entry);
            if self.instr_history.len() == HISTORY_LEN {
                self.instr_history.pop_front();
            }
            self.instr_history.push_back(entry);
        }

        self.machine.decode_step()?;
        self.machine.execute_step()?;
        self.cycles += 1;
        if self.machine.is_halted() {
            log::debug!("halted after {} cycles", self.cycles);
            self.state = EmuState::Halt;
        }
        Ok(())
    }

    pub fn debug(&mut self) -> Result<()> {
        Debugger::new(self).repl()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::asm::assemble;

    fn emulator(source: &str, hz: Option<f64>) -> Emulator {
        let mut machine = Machine::new();
        machine.load_program(&assemble(source).unwrap(), 0).unwrap();
        Emulator::new(machine, hz).unwrap()
    }

    #[test]
    fn test_run_to_halt() {
        let mut emu = emulator("load 3 -> a\ninc\nout\nhalt", None);
        assert_eq!(emu.run().unwrap(), EmuState::Halt);
        assert_eq!(emu.machine.register(Register::OUT), 4);
        let history: Vec<String> = emu.instr_history.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            history,
            vec![
                "[pc=00] load 3 -> a",
                "[pc=02] inc",
                "[pc=04] out",
                "[pc=06] halt"
            ]
        );
        // a halted emulator stays put
        let cycles = emu.cycles();
        emu.microstep().unwrap();
        assert_eq!(emu.cycles(), cycles);
    }

    #[test]
    fn test_step_instr() {
        let mut emu = emulator("load 3 -> a\nload 4 -> b\nhalt", None);
        emu.step_instr().unwrap();
        assert_eq!(emu.machine.register(Register::A), 3);
        assert_eq!(emu.machine.register(Register::B), 0);
        assert_eq!(emu.machine.micro_counter(), 0);
        assert_eq!(emu.cycles(), 5);
    }

    #[test]
    fn test_breakpoint() {
        let mut emu = emulator("load 3 -> a\nload 4 -> b\nhalt", None);
        emu.breakpoints.insert(2);
        assert_eq!(emu.run().unwrap(), EmuState::Pause);
        assert_eq!(emu.machine.register(Register::PC), 2);
        assert_eq!(emu.machine.register(Register::B), 0);
        // resuming does not stop at the same breakpoint again
        emu.state = EmuState::Continue;
        assert_eq!(emu.run().unwrap(), EmuState::Halt);
        assert_eq!(emu.machine.register(Register::B), 4);
    }

    #[test]
    fn test_cycle_limit() {
        let mut emu = emulator("jmp 0", None).with_max_cycles(50);
        assert!(emu.run().is_err());
        assert_eq!(emu.cycles(), 50);
    }

    #[test]
    fn test_clock_pacing() {
        let mut emu = emulator("load 1 -> a\nload 2 -> a\nhalt", Some(1000.0));
        let start = Instant::now();
        emu.run().unwrap();
        // the first tick is immediate
        assert!(start.elapsed() >= Duration::from_millis(emu.cycles() - 2));
    }

    #[test]
    fn test_invalid_clock_rate() {
        assert!(Emulator::new(Machine::new(), Some(0.0)).is_err());
        assert!(Emulator::new(Machine::new(), Some(f64::NAN)).is_err());
    }
}
