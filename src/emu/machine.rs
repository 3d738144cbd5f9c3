//! The control unit and datapath of SA2.

use crate::plat::{AluMode, ControlWord, Flags, Register, MEMORY_SIZE};

use super::{
    alu::AluRegister,
    bus::Bus,
    coordinator::{BusNode, TransmissionCoordinator},
    microcode::{self, FETCH_CYCLE},
    observer::{CycleObserver, LogObserver},
    output::{OutputDevice, OutputPort},
    ram::Ram,
    registers::{self, BusConnectable, FlagRegister},
    EResult, EmuError, MachineConfig,
};

/// Control lines that make a node drive the bus.
const TRANSMIT_LINES: [(ControlWord, BusNode); 9] = [
    (ControlWord::IO, BusNode::Reg(Register::IP)),
    (ControlWord::CO, BusNode::Reg(Register::PC)),
    (ControlWord::OPO, BusNode::Reg(Register::OP)),
    (ControlWord::AO, BusNode::Reg(Register::A)),
    (ControlWord::BO, BusNode::Reg(Register::B)),
    (ControlWord::XO, BusNode::Reg(Register::X)),
    (ControlWord::SO, BusNode::Reg(Register::SP)),
    (ControlWord::EO, BusNode::Reg(Register::ALU)),
    (ControlWord::MO, BusNode::Memory),
];

/// Control lines that make a node latch the bus.
const RECEIVE_LINES: [(ControlWord, BusNode); 12] = [
    (ControlWord::II, BusNode::Reg(Register::IP)),
    (ControlWord::CI, BusNode::Reg(Register::PC)),
    (ControlWord::OPI, BusNode::Reg(Register::OP)),
    (ControlWord::AI, BusNode::Reg(Register::A)),
    (ControlWord::BI, BusNode::Reg(Register::B)),
    (ControlWord::XI, BusNode::Reg(Register::X)),
    (ControlWord::SI, BusNode::Reg(Register::SP)),
    (ControlWord::OAI, BusNode::Reg(Register::OA)),
    (ControlWord::OI, BusNode::Reg(Register::OUT)),
    (ControlWord::MAI, BusNode::Reg(Register::MA)),
    (ControlWord::MI, BusNode::Memory),
    (ControlWord::ODI, BusNode::OutputData),
];

/// Every bus participant, in display order.
const ALL_NODES: [BusNode; 14] = [
    BusNode::Reg(Register::A),
    BusNode::Reg(Register::B),
    BusNode::Reg(Register::X),
    BusNode::Reg(Register::SP),
    BusNode::Reg(Register::IP),
    BusNode::Reg(Register::OP),
    BusNode::Reg(Register::PC),
    BusNode::Reg(Register::ALU),
    BusNode::Reg(Register::FR),
    BusNode::Reg(Register::OUT),
    BusNode::Reg(Register::MA),
    BusNode::Reg(Register::OA),
    BusNode::Memory,
    BusNode::OutputData,
];

/// All storage of the machine. Nodes are addressed through [`BusNode`] handles; nothing in here
/// refers to anything else.
#[derive(Debug)]
pub struct Datapath {
    a: registers::Register,
    b: registers::Register,
    x: registers::Register,
    sp: registers::Register,
    ip: registers::Register,
    op: registers::Register,
    pc: registers::Register,
    out: registers::Register,
    alu: AluRegister,
    fr: FlagRegister,
    ram: Ram,
    output: OutputPort,
}

impl Datapath {
    /// Creates a new [`Datapath`] with the standard output peripherals.
    pub fn new() -> Self {
        Self::with_output(OutputPort::default())
    }

    fn with_output(output: OutputPort) -> Self {
        Self {
            a: registers::Register::new("A", true),
            b: registers::Register::new("B", true),
            x: registers::Register::new("X", true),
            sp: registers::Register::new("SP", true),
            ip: registers::Register::new("IP", false),
            op: registers::Register::new("OP", true),
            pc: registers::Register::new("PC", true),
            out: registers::Register::new("OUT", false),
            alu: AluRegister::new(),
            fr: FlagRegister::new(),
            ram: Ram::new(),
            output,
        }
    }

    pub fn node(&self, node: BusNode) -> &dyn BusConnectable {
        match node {
            BusNode::Reg(Register::A) => &self.a,
            BusNode::Reg(Register::B) => &self.b,
            BusNode::Reg(Register::X) => &self.x,
            BusNode::Reg(Register::SP) => &self.sp,
            BusNode::Reg(Register::IP) => &self.ip,
            BusNode::Reg(Register::OP) => &self.op,
            BusNode::Reg(Register::PC) => &self.pc,
            BusNode::Reg(Register::OUT) => &self.out,
            BusNode::Reg(Register::ALU) => &self.alu,
            BusNode::Reg(Register::FR) => &self.fr,
            BusNode::Reg(Register::MA) => self.ram.address(),
            BusNode::Reg(Register::OA) => self.output.address(),
            BusNode::Memory => &self.ram,
            BusNode::OutputData => &self.output,
        }
    }

    pub fn node_mut(&mut self, node: BusNode) -> &mut dyn BusConnectable {
        match node {
            BusNode::Reg(Register::A) => &mut self.a,
            BusNode::Reg(Register::B) => &mut self.b,
            BusNode::Reg(Register::X) => &mut self.x,
            BusNode::Reg(Register::SP) => &mut self.sp,
            BusNode::Reg(Register::IP) => &mut self.ip,
            BusNode::Reg(Register::OP) => &mut self.op,
            BusNode::Reg(Register::PC) => &mut self.pc,
            BusNode::Reg(Register::OUT) => &mut self.out,
            BusNode::Reg(Register::ALU) => &mut self.alu,
            BusNode::Reg(Register::FR) => &mut self.fr,
            BusNode::Reg(Register::MA) => self.ram.address_mut(),
            BusNode::Reg(Register::OA) => self.output.address_mut(),
            BusNode::Memory => &mut self.ram,
            BusNode::OutputData => &mut self.output,
        }
    }

    /// Reads any register, readable or not.
    pub fn get(&self, reg: Register) -> u8 {
        match reg {
            Register::A => self.a.value(),
            Register::B => self.b.value(),
            Register::X => self.x.value(),
            Register::SP => self.sp.value(),
            Register::IP => self.ip.value(),
            Register::OP => self.op.value(),
            Register::PC => self.pc.value(),
            Register::OUT => self.out.value(),
            Register::ALU => self.alu.value(),
            Register::FR => self.fr.value(),
            Register::MA => self.ram.address().value(),
            Register::OA => self.output.address().value(),
        }
    }

    /// Overwrites any register, bypassing the bus.
    pub fn set(&mut self, reg: Register, value: u8) {
        match reg {
            Register::A => self.a.set(value),
            Register::B => self.b.set(value),
            Register::X => self.x.set(value),
            Register::SP => self.sp.set(value),
            Register::IP => self.ip.set(value),
            Register::OP => self.op.set(value),
            Register::PC => self.pc.set(value),
            Register::OUT => self.out.set(value),
            Register::ALU => self.alu.set(value),
            Register::FR => self.fr.set(value),
            Register::MA => self.ram.address_mut().set(value),
            Register::OA => self.output.address_mut().set(value),
        }
    }

    /// The nodes currently marked for a bus action.
    pub fn active_nodes(&self) -> Vec<BusNode> {
        ALL_NODES
            .into_iter()
            .filter(|&node| self.node(node).is_acting())
            .collect()
    }

    fn reset(&mut self, stack_start: u8) {
        for reg in [
            &mut self.a,
            &mut self.b,
            &mut self.x,
            &mut self.ip,
            &mut self.op,
            &mut self.pc,
            &mut self.out,
        ] {
            reg.reset(0);
        }
        self.sp.reset(stack_start);
        self.alu.reset();
        self.fr.reset();
        self.ram.reset();
        self.output.reset();
    }
}

impl Default for Datapath {
    fn default() -> Self {
        Self::new()
    }
}

/// The SA2 machine: datapath, bus and the micro-sequencing control unit.
///
/// Each cycle is two calls, [`Machine::decode_step`] then [`Machine::execute_step`], so callers
/// can inspect the marked nodes in between.
pub struct Machine {
    datapath: Datapath,
    bus: Bus,
    coordinator: TransmissionCoordinator,
    micro_counter: u8,
    halted: bool,
    micro_program: Vec<ControlWord>,
    active_word: Option<ControlWord>,
    last_bus_value: u8,
    stack_top: u8,
    config: MachineConfig,
    observer: Box<dyn CycleObserver>,
}

impl Machine {
    /// Creates a new [`Machine`] in its power-on state with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        let mut this = Self {
            datapath: Datapath::new(),
            bus: Bus::new(),
            coordinator: TransmissionCoordinator::new(),
            micro_counter: 0,
            halted: false,
            micro_program: Vec::new(),
            active_word: None,
            last_bus_value: 0,
            stack_top: config.stack_start,
            config,
            observer: Box::new(LogObserver),
        };
        this.reset();
        this
    }

    /// Replaces the output peripherals.
    pub fn with_output(mut self, device: Box<dyn OutputDevice>) -> Self {
        self.datapath.output = OutputPort::new(device);
        self
    }

    /// Replaces the diagnostic observer. The default forwards to `log`.
    pub fn set_observer(&mut self, observer: Box<dyn CycleObserver>) {
        self.observer = observer;
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Back to power-on state: registers and memory zeroed, SP at the top of the stack, not
    /// halted.
    pub fn reset(&mut self) {
        self.datapath.reset(self.config.stack_start);
        self.bus = Bus::new();
        self.coordinator.clear();
        self.micro_counter = 0;
        self.halted = false;
        self.micro_program.clear();
        self.active_word = None;
        self.last_bus_value = 0;
        self.stack_top = self.config.stack_start;
    }

    /// Replaces the whole memory.
    ///
    /// # Errors
    ///
    /// Fails with [`EmuError::SizeMismatch`] unless `image` is exactly 256 bytes long.
    pub fn load_image(&mut self, image: &[u8]) -> EResult<()> {
        self.datapath.ram.load_image(image)
    }

    /// Writes a machine-code stream into memory at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`EmuError::SizeMismatch`] if the program does not fit.
    pub fn load_program(&mut self, program: &[u8], offset: u8) -> EResult<()> {
        self.datapath.ram.load_at(program, offset)
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        self.datapath.ram.cells()
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.datapath.get(reg)
    }

    pub fn set_register(&mut self, reg: Register, value: u8) {
        self.datapath.set(reg, value);
    }

    pub fn flags(&self) -> Flags {
        self.datapath.fr.flags()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn micro_counter(&self) -> u8 {
        self.micro_counter
    }

    /// The control word selected by the last decode step, until it is executed.
    pub fn active_word(&self) -> Option<ControlWord> {
        self.active_word
    }

    /// The decoded micro-program of the current instruction.
    pub fn micro_program(&self) -> &[ControlWord] {
        &self.micro_program
    }

    /// The value carried by the bus in the last executed cycle, 0 if it was not written.
    pub fn last_bus_value(&self) -> u8 {
        self.last_bus_value
    }

    pub fn bus_in_use(&self) -> bool {
        self.coordinator.bus_in_use()
    }

    pub fn active_nodes(&self) -> Vec<BusNode> {
        self.datapath.active_nodes()
    }

    pub fn output(&self) -> &dyn OutputDevice {
        self.datapath.output.device()
    }

    /// Selects the control word for the current micro-step and applies it to the datapath.
    ///
    /// Steps 0-3 run the fetch cycle. At step 4 the fetched opcode is decoded against the
    /// current flags and the resulting program runs from there on.
    ///
    /// # Errors
    ///
    /// [`EmuError::ReadForbidden`] if the word makes a non-readable node transmit,
    /// [`EmuError::StackOverflow`] if it moves SP out of the stack region.
    pub fn decode_step(&mut self) -> EResult<()> {
        if self.halted {
            return Ok(());
        }
        let step = self.micro_counter as usize;
        let word = if step < FETCH_CYCLE.len() {
            FETCH_CYCLE[step]
        } else {
            if step == FETCH_CYCLE.len() {
                self.micro_program =
                    microcode::decode(self.datapath.ip.value(), self.datapath.fr.flags());
            }
            self.micro_program
                .get(step - FETCH_CYCLE.len())
                .copied()
                .unwrap_or(ControlWord::MSR)
        };
        self.issue(word)
    }

    /// Applies an arbitrary control word as the decode half of a cycle.
    ///
    /// # Errors
    ///
    /// See [`Machine::decode_step`]. On error no node stays marked.
    pub fn issue(&mut self, word: ControlWord) -> EResult<()> {
        if self.halted {
            return Ok(());
        }
        self.observer.cycle_start(self.micro_counter, word);
        self.active_word = Some(word);
        if word.contains(ControlWord::HLT) {
            log::debug!("halted");
            self.halted = true;
            return Ok(());
        }
        let result = self.apply(word);
        if let Err(e) = &result {
            self.observer.error(e);
            self.coordinator.abort(&mut self.datapath);
            self.active_word = None;
        }
        result
    }

    fn apply(&mut self, word: ControlWord) -> EResult<()> {
        self.check_stack(word)?;

        for (line, node) in TRANSMIT_LINES {
            if word.contains(line) {
                self.coordinator
                    .note_for_transmission(&mut self.datapath, node)?;
            }
        }
        for (line, node) in RECEIVE_LINES {
            if word.contains(line) {
                self.coordinator.note_for_reception(&mut self.datapath, node);
            }
        }

        let dp = &mut self.datapath;
        if word.contains(ControlWord::CE) {
            dp.pc.set(dp.pc.value().wrapping_add(1));
        }
        if word.contains(ControlWord::X1) {
            dp.x.set(1);
        }
        if word.contains(ControlWord::SP1) {
            dp.sp.set(dp.sp.value().wrapping_add(1));
        }
        if word.contains(ControlWord::SM1) {
            dp.sp.set(dp.sp.value().wrapping_sub(1));
        }

        dp.alu.set_mode(AluMode::from_word(word));
        let (_, flags) = dp.alu.compute(dp.a.value(), dp.x.value());
        if word.contains(ControlWord::EO) {
            dp.fr.latch(flags);
        }
        Ok(())
    }

    fn check_stack(&self, word: ControlWord) -> EResult<()> {
        if !self.config.enforce_stack_bounds {
            return Ok(());
        }
        let sp = self.datapath.sp.value();
        let top = self.stack_top;
        let overflow = (word.contains(ControlWord::SM1)
            && top.wrapping_sub(sp) >= self.config.stack_size)
            || (word.contains(ControlWord::SP1) && sp == top);
        if overflow {
            Err(EmuError::StackOverflow { sp, top })
        } else {
            Ok(())
        }
    }

    /// Performs the bus transfer of the active word, clocks the datapath and advances the
    /// micro-step counter.
    ///
    /// Does nothing when halted or when no word was decoded since the last call.
    ///
    /// # Errors
    ///
    /// [`EmuError::BusConflict`] for two transmitters, [`EmuError::BusUnwritten`] for a receiver
    /// without a transmitter. The cycle is abandoned: nothing is clocked and the counter stays.
    pub fn execute_step(&mut self) -> EResult<()> {
        if self.halted {
            return Ok(());
        }
        let Some(word) = self.active_word.take() else {
            return Ok(());
        };
        let result =
            self.coordinator
                .execute(&mut self.datapath, &mut self.bus, self.observer.as_mut());
        self.last_bus_value = self.bus.receive().unwrap_or(0);
        if result.is_err() {
            self.last_bus_value = 0;
            self.datapath.fr.discard();
            self.datapath.alu.set_mode(AluMode::Add);
            self.bus.clock_reset();
            return result;
        }

        if word.contains(ControlWord::OCI) {
            self.datapath.output.process_command(self.last_bus_value);
        }
        if word.contains(ControlWord::SI) {
            self.stack_top = self.datapath.sp.value();
        }
        self.datapath.alu.clock();
        self.datapath.fr.clock();
        self.bus.clock_reset();

        self.micro_counter = if word.contains(ControlWord::MSR) {
            0
        } else {
            (self.micro_counter + 1) % 8
        };
        Ok(())
    }

    /// One full cycle: decode then execute.
    pub fn step_cycle(&mut self) -> EResult<()> {
        self.decode_step()?;
        self.execute_step()
    }

    /// Runs cycles until the current instruction completes or the machine halts. Returns the
    /// number of cycles run.
    pub fn step_instruction(&mut self) -> EResult<usize> {
        let mut cycles = 0;
        while !self.halted {
            self.step_cycle()?;
            cycles += 1;
            if self.micro_counter == 0 {
                break;
            }
        }
        Ok(cycles)
    }

    /// Runs until the machine halts or `max_cycles` cycles have passed. Returns the number of
    /// cycles run.
    pub fn run_until_halt(&mut self, max_cycles: u64) -> EResult<u64> {
        let mut cycles = 0;
        while !self.halted && cycles < max_cycles {
            self.step_cycle()?;
            cycles += 1;
        }
        Ok(cycles)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{asm::assemble, emu::output::StandardOutput};

    fn run(source: &str) -> Machine {
        let program = assemble(source).unwrap();
        let mut machine = Machine::new();
        machine.load_program(&program, 0).unwrap();
        machine.run_until_halt(10_000).unwrap();
        assert!(machine.is_halted());
        machine
    }

    #[test]
    fn test_fetch_cycle() {
        let mut image = [0u8; MEMORY_SIZE];
        image[0] = 0x10;
        image[1] = 0x05;
        image[5] = 0x05;
        let mut m = Machine::new();
        m.load_image(&image).unwrap();
        for _ in 0..4 {
            m.step_cycle().unwrap();
        }
        assert_eq!(m.micro_counter(), 4);
        assert_eq!(m.register(Register::IP), 0x10);
        assert_eq!(m.register(Register::OP), 0x05);
        assert_eq!(m.register(Register::PC), 2);
        m.step_cycle().unwrap();
        assert_eq!(m.micro_program().len(), 2);
        m.step_cycle().unwrap();
        assert_eq!(m.register(Register::A), 0x05);
        assert_eq!(m.micro_counter(), 0);
    }

    #[test]
    fn test_fetch_cycle_immediate() {
        let mut m = Machine::new();
        m.load_program(&[0x12, 0x05], 0).unwrap();
        assert_eq!(m.step_instruction(), Ok(5));
        assert_eq!(m.register(Register::A), 0x05);
        assert_eq!(m.micro_counter(), 0);
    }

    #[test]
    fn test_decode_marks_nodes() {
        let mut m = Machine::new();
        m.decode_step().unwrap();
        assert_eq!(m.active_word(), Some(ControlWord::CO | ControlWord::MAI));
        assert!(m.bus_in_use());
        assert_eq!(
            m.active_nodes(),
            vec![BusNode::Reg(Register::PC), BusNode::Reg(Register::MA)]
        );
        m.execute_step().unwrap();
        assert!(m.active_nodes().is_empty());
        assert!(!m.bus_in_use());
        assert_eq!(m.micro_counter(), 1);
    }

    #[test]
    fn test_bus_conflict() {
        let mut m = Machine::new();
        m.set_register(Register::A, 1);
        m.set_register(Register::B, 2);
        m.issue(ControlWord::AO | ControlWord::BO).unwrap();
        assert_eq!(
            m.execute_step(),
            Err(EmuError::BusConflict {
                held: 1,
                rejected: 2
            })
        );
        assert!(m.active_nodes().is_empty());
        assert_eq!(m.last_bus_value(), 0);
    }

    #[test]
    fn test_failed_cycle_latches_no_flags() {
        let mut m = Machine::new();
        // A - X = 0 latches ZERO, but ALU and A both drive the bus
        m.issue(ControlWord::EO | ControlWord::SUB | ControlWord::AO)
            .unwrap();
        assert_eq!(
            m.execute_step(),
            Err(EmuError::BusConflict {
                held: 0,
                rejected: 0
            })
        );
        assert_eq!(m.flags(), Flags::empty());
        m.issue(ControlWord::CO | ControlWord::MAI).unwrap();
        m.execute_step().unwrap();
        assert_eq!(m.flags(), Flags::empty());
        assert_eq!(m.datapath.alu.mode(), AluMode::Add);
    }

    #[test]
    fn test_single_transmitter() {
        let mut m = Machine::new();
        m.set_register(Register::A, 0x77);
        m.issue(ControlWord::AO | ControlWord::BI | ControlWord::XI | ControlWord::MAI)
            .unwrap();
        m.execute_step().unwrap();
        assert_eq!(m.register(Register::B), 0x77);
        assert_eq!(m.register(Register::X), 0x77);
        assert_eq!(m.register(Register::MA), 0x77);
        assert_eq!(m.last_bus_value(), 0x77);
    }

    #[test]
    fn test_read_forbidden() {
        let mut m = Machine::new();
        assert_eq!(
            m.issue(ControlWord::IO | ControlWord::AI),
            Err(EmuError::ReadForbidden("IP"))
        );
        assert!(m.active_nodes().is_empty());
        assert_eq!(m.active_word(), None);
    }

    #[test]
    fn test_conditional_jump_not_taken() {
        let mut m = Machine::new();
        m.load_program(&[0xA3, 0x10], 0).unwrap();
        for _ in 0..4 {
            m.step_cycle().unwrap();
        }
        m.decode_step().unwrap();
        assert_eq!(m.micro_program(), &[ControlWord::MSR]);
        assert!(m.active_nodes().is_empty());
        m.execute_step().unwrap();
        assert_eq!(m.micro_counter(), 0);
        assert_eq!(m.register(Register::PC), 2);
    }

    #[test]
    fn test_conditional_jump_taken() {
        let mut m = Machine::new();
        m.load_program(&[0xA3, 0x10], 0).unwrap();
        m.set_register(Register::FR, Flags::ZERO.bits());
        m.step_instruction().unwrap();
        assert_eq!(m.register(Register::PC), 0x10);
    }

    #[test]
    fn test_stack_round_trip() {
        let mut m = Machine::new();
        #[rustfmt::skip]
        let program = [
            0x12, 0x42, // load 0x42 -> a
            0xB0, 0x00, // push a
            0x12, 0x00, // load 0 -> a
            0xB1, 0x00, // pop a
            0x01, 0x00, // halt
        ];
        m.load_program(&program, 0).unwrap();
        m.step_instruction().unwrap();
        let sp = m.register(Register::SP);
        m.step_instruction().unwrap();
        assert_eq!(m.register(Register::SP), sp.wrapping_sub(1));
        assert_eq!(m.memory()[sp as usize], 0x42);
        m.run_until_halt(100).unwrap();
        assert_eq!(m.register(Register::A), 0x42);
        assert_eq!(m.register(Register::SP), sp);
    }

    #[test]
    fn test_stack_overflow() {
        let mut program = [0xB0, 0x00].repeat(17);
        program.extend([0x01, 0x00]);
        let mut m = Machine::new();
        m.load_program(&program, 0).unwrap();
        assert_eq!(
            m.run_until_halt(1000),
            Err(EmuError::StackOverflow { sp: 0xEF, top: 0xFF })
        );

        let mut m = Machine::new();
        m.load_program(&[0xB1, 0x00], 0).unwrap();
        assert_eq!(
            m.step_instruction(),
            Err(EmuError::StackOverflow { sp: 0xFF, top: 0xFF })
        );

        let mut m = Machine::with_config(MachineConfig {
            enforce_stack_bounds: false,
            ..Default::default()
        });
        m.load_program(&[0xB1, 0x00], 0).unwrap();
        m.step_instruction().unwrap();
        assert_eq!(m.register(Register::SP), 0x00);
    }

    #[test]
    fn test_halt_and_reset() {
        let mut m = Machine::new();
        m.load_program(&[0x12, 0x09, 0x01, 0x00], 0).unwrap();
        m.run_until_halt(100).unwrap();
        assert!(m.is_halted());
        let pc = m.register(Register::PC);
        m.step_cycle().unwrap();
        m.step_cycle().unwrap();
        assert_eq!(m.register(Register::PC), pc);

        m.reset();
        assert!(!m.is_halted());
        assert_eq!(m.register(Register::A), 0);
        assert_eq!(m.register(Register::SP), 0xFF);
        assert!(m.memory().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_observer_sees_transfers() {
        struct Recorder(Rc<RefCell<Vec<u8>>>);
        impl CycleObserver for Recorder {
            fn bus_transfer(&mut self, _from: Option<BusNode>, _to: &[BusNode], value: u8) {
                self.0.borrow_mut().push(value);
            }
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut m = Machine::new();
        m.set_observer(Box::new(Recorder(seen.clone())));
        m.load_program(&[0x12, 0x33], 0).unwrap();
        m.step_instruction().unwrap();
        // PC, opcode, PC, operand, operand into A
        assert_eq!(*seen.borrow(), vec![0, 0x12, 1, 0x33, 0x33]);
    }

    #[test]
    fn test_sum_loop() {
        let m = run("\
load 5 -> a
store a -> $100
load 0 -> a
add $100
store a -> $101
load $100 -> a
dec
store a -> $100
load $101 -> a
jmpnz 6
out
halt
");
        assert_eq!(m.register(Register::OUT), 15);
        assert_eq!(m.memory()[100], 0);
    }

    #[test]
    fn test_alu_sources() {
        let m = run("\
load 200 -> a
store a -> $50
load 50 -> b
load 3 -> a
add $b
sub x
or $50
and b
halt
");
        // ((3 + 200 - 200) | 200) & 50
        assert_eq!(m.register(Register::A), 2);
        assert_eq!(m.register(Register::X), 50);
        assert_eq!(m.flags(), Flags::empty());
    }

    #[test]
    fn test_swap_and_moves() {
        let m = run("load 1 -> a\nload 2 -> b\nswap\nmove sp,x\nhalt");
        assert_eq!(m.register(Register::A), 2);
        assert_eq!(m.register(Register::B), 1);
        assert_eq!(m.register(Register::X), 0xFF);
    }

    #[test]
    fn test_call_return() {
        let m = run("\
call 6
out
halt
load 7 -> a
inc
return
");
        assert_eq!(m.register(Register::OUT), 8);
        assert_eq!(m.register(Register::SP), 0xFF);
    }

    #[test]
    fn test_output_bus() {
        let mut m = Machine::new().with_output(Box::new(StandardOutput::new()));
        let program = assemble("out cmd 2\nout addr 32\nout dat 72\nout addr 33\nout dat 105\nhalt")
            .unwrap();
        m.load_program(&program, 0).unwrap();
        m.run_until_halt(1000).unwrap();
        assert_eq!(m.register(Register::OA), 33);
        assert_eq!(
            m.output().render(),
            "Hi______________\n________________\n"
        );
    }
}
