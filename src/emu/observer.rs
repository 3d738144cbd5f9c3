use crate::plat::ControlWord;

use super::{coordinator::BusNode, EmuError};

/// Diagnostic hook invoked by the control unit and the coordinator. Never required for
/// correctness; every method defaults to doing nothing.
pub trait CycleObserver {
    /// A decode step selected `word` at micro-step `counter`.
    fn cycle_start(&mut self, _counter: u8, _word: ControlWord) {}

    /// `value` travelled over the bus from `from` to every node in `to`.
    fn bus_transfer(&mut self, _from: Option<BusNode>, _to: &[BusNode], _value: u8) {}

    /// A step failed.
    fn error(&mut self, _error: &EmuError) {}
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl CycleObserver for LogObserver {
    fn cycle_start(&mut self, counter: u8, word: ControlWord) {
        log::trace!("> [{counter}] {word:?}");
    }

    fn bus_transfer(&mut self, from: Option<BusNode>, to: &[BusNode], value: u8) {
        match from {
            Some(from) => log::trace!("  {from} -> {to:?}: {value:#04x}"),
            None => log::trace!("  bus idle -> {to:?}"),
        }
    }

    fn error(&mut self, error: &EmuError) {
        log::warn!("{error}");
    }
}
