use super::{EResult, EmuError};

/// The single shared byte-wide bus. At most one component may write it per cycle.
#[derive(Debug, Default, Clone)]
pub struct Bus {
    value: u8,
    has_value: bool,
    last: u8,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a value on the bus.
    ///
    /// # Errors
    ///
    /// Fails with [`EmuError::BusConflict`] if the bus was already written this cycle.
    pub fn transmit(&mut self, value: u8) -> EResult<()> {
        if self.has_value {
            return Err(EmuError::BusConflict {
                held: self.value,
                rejected: value,
            });
        }
        self.value = value;
        self.last = value;
        self.has_value = true;
        Ok(())
    }

    /// Reads the value written this cycle.
    ///
    /// # Errors
    ///
    /// Fails with [`EmuError::BusUnwritten`] if nothing was written yet.
    pub fn receive(&self) -> EResult<u8> {
        if self.has_value {
            Ok(self.value)
        } else {
            Err(EmuError::BusUnwritten)
        }
    }

    pub fn has_value(&self) -> bool {
        self.has_value
    }

    /// The most recently transmitted value. Survives [`Bus::clock_reset`] until the next write.
    pub fn last_value(&self) -> u8 {
        self.last
    }

    /// Ends the cycle. Must happen after every register has been clocked.
    pub fn clock_reset(&mut self) {
        self.value = 0;
        self.has_value = false;
    }
}
