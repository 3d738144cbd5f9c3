use std::mem;

use crate::plat::Flags;

use super::{bus::Bus, EResult, EmuError};

/// The bus action a component performs in the current cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusAction {
    #[default]
    None,
    Transmit,
    Receive,
}

/// Anything that can be marked to drive or sample the bus for one cycle.
pub trait BusConnectable {
    /// Marks the component to put its value on the bus in the next cycle.
    fn mark_transmit(&mut self) -> EResult<()>;

    /// Marks the component to latch the bus value in the next cycle.
    fn mark_receive(&mut self);

    /// Performs the marked bus action. The marking is cleared afterwards, also when the bus
    /// reports an error.
    fn resolve_cycle(&mut self, bus: &mut Bus) -> EResult<()>;

    fn bus_action(&self) -> BusAction;

    /// Drops a pending marking without touching the bus.
    fn unmark(&mut self);

    fn is_acting(&self) -> bool {
        self.bus_action() != BusAction::None
    }
}

/// A byte-wide register attached to the bus.
#[derive(Debug, Clone)]
pub struct Register {
    name: &'static str,
    value: u8,
    readable: bool,
    action: BusAction,
}

impl Register {
    /// Creates a new [`Register`] holding 0.
    pub fn new(name: &'static str, readable: bool) -> Self {
        Self {
            name,
            value: 0,
            readable,
            action: BusAction::None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Sets the value directly, bypassing the bus. Used for the control unit's immediate effects.
    pub fn set(&mut self, value: u8) {
        self.value = value;
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// Back to power-on state: holding `value`, unmarked.
    pub fn reset(&mut self, value: u8) {
        self.value = value;
        self.action = BusAction::None;
    }
}

impl BusConnectable for Register {
    fn mark_transmit(&mut self) -> EResult<()> {
        if !self.readable {
            return Err(EmuError::ReadForbidden(self.name));
        }
        self.action = BusAction::Transmit;
        Ok(())
    }

    fn mark_receive(&mut self) {
        self.action = BusAction::Receive;
    }

    fn resolve_cycle(&mut self, bus: &mut Bus) -> EResult<()> {
        match mem::take(&mut self.action) {
            BusAction::None => {}
            BusAction::Transmit => bus.transmit(self.value)?,
            BusAction::Receive => self.value = bus.receive()?,
        }
        Ok(())
    }

    fn bus_action(&self) -> BusAction {
        self.action
    }

    fn unmark(&mut self) {
        self.action = BusAction::None;
    }
}

/// The flag register. Its byte is read positionally as [`Flags`] and is only ever written from
/// ALU results, latched at the end of a cycle.
#[derive(Debug, Clone)]
pub struct FlagRegister {
    reg: Register,
    pending: Option<Flags>,
}

impl FlagRegister {
    pub fn new() -> Self {
        Self {
            reg: Register::new("FR", false),
            pending: None,
        }
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.reg.value())
    }

    pub fn value(&self) -> u8 {
        self.reg.value()
    }

    /// Overwrites the flags directly.
    pub fn set(&mut self, value: u8) {
        self.reg.set(value);
    }

    /// Queues ALU flags to be latched at the end of the cycle.
    pub fn latch(&mut self, flags: Flags) {
        self.pending = Some(flags);
    }

    /// Ends the cycle, applying any latched flags.
    pub fn clock(&mut self) {
        if let Some(flags) = self.pending.take() {
            self.reg.set(flags.bits());
        }
    }

    /// Drops latched flags of an abandoned cycle.
    pub fn discard(&mut self) {
        self.pending = None;
    }

    pub fn reset(&mut self) {
        self.reg.reset(0);
        self.pending = None;
    }
}

impl Default for FlagRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl BusConnectable for FlagRegister {
    fn mark_transmit(&mut self) -> EResult<()> {
        self.reg.mark_transmit()
    }

    fn mark_receive(&mut self) {
        self.reg.mark_receive()
    }

    fn resolve_cycle(&mut self, bus: &mut Bus) -> EResult<()> {
        self.reg.resolve_cycle(bus)
    }

    fn bus_action(&self) -> BusAction {
        self.reg.bus_action()
    }

    fn unmark(&mut self) {
        self.reg.unmark()
    }
}
