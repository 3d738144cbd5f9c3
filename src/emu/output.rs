//! The output bus and its peripherals.

use std::fmt;

use super::{
    bus::Bus,
    registers::{BusAction, BusConnectable, Register},
    EResult, EmuError,
};

/// Width of one LCD row in characters.
pub const LCD_WIDTH: usize = 16;
/// Side length of the square pixel screen.
pub const SCREEN_SIZE: usize = 8;

/// A peripheral listening on the output bus.
pub trait OutputDevice: fmt::Debug {
    /// Applies a command byte. Commands are persistent settings.
    fn process_command(&mut self, command: u8);

    /// Applies a data byte sent to `address`.
    fn process_data(&mut self, address: u8, data: u8);

    /// Back to the blank power-on state.
    fn reset(&mut self);

    /// A text rendering of the device for terminals.
    fn render(&self) -> String {
        String::new()
    }
}

/// The standard peripherals: a 2x16 character LCD and an 8x8 monochrome pixel screen.
///
/// Command bit 1 switches the LCD on or off, bit 2 the pixel screen. Data sent to 0x10-0x17
/// sets a pixel row (MSB is the leftmost pixel), 0x20-0x2F and 0x30-0x3F set a character in
/// the first and second LCD row. Both displays are off until a command switches them on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardOutput {
    lcd: [[u8; LCD_WIDTH]; 2],
    screen: [u8; SCREEN_SIZE],
    lcd_on: bool,
    screen_on: bool,
}

impl StandardOutput {
    pub fn new() -> Self {
        Self {
            lcd: [[b' '; LCD_WIDTH]; 2],
            screen: [0; SCREEN_SIZE],
            lcd_on: false,
            screen_on: false,
        }
    }

    pub fn lcd_on(&self) -> bool {
        self.lcd_on
    }

    pub fn screen_on(&self) -> bool {
        self.screen_on
    }

    /// One LCD row as text.
    pub fn lcd_line(&self, row: usize) -> String {
        self.lcd[row].iter().map(|&c| c as char).collect()
    }

    pub fn pixel(&self, row: usize, col: usize) -> bool {
        (self.screen[row] >> (SCREEN_SIZE - 1 - col)) & 1 == 1
    }
}

impl Default for StandardOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for StandardOutput {
    fn process_command(&mut self, command: u8) {
        self.lcd_on = (command >> 1) & 1 == 1;
        self.screen_on = (command >> 2) & 1 == 1;
    }

    fn process_data(&mut self, address: u8, data: u8) {
        match address {
            0x10..=0x17 => self.screen[(address & 0x0F) as usize] = data,
            0x20..=0x3F => {
                let row = ((address - 0x20) / 0x10) as usize;
                let col = (address & 0x0F) as usize;
                self.lcd[row][col] = if data.is_ascii_graphic() { data } else { b' ' };
            }
            _ => log::trace!("output data {data:#04x} to unmapped address {address:#04x}"),
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn render(&self) -> String {
        let mut out = String::new();
        if self.lcd_on {
            for row in 0..2 {
                out.push_str(&self.lcd_line(row).replace(' ', "_"));
                out.push('\n');
            }
        }
        if self.screen_on {
            for row in 0..SCREEN_SIZE {
                let line: String = (0..SCREEN_SIZE)
                    .map(|col| if self.pixel(row, col) { '█' } else { ' ' })
                    .collect();
                out.push_str(line.trim_end());
                out.push('\n');
            }
        }
        out
    }
}

/// The machine's end of the output bus: the output address register (OA) and the data input
/// that forwards received bytes to the attached device.
#[derive(Debug)]
pub struct OutputPort {
    address: Register,
    action: BusAction,
    device: Box<dyn OutputDevice>,
}

impl OutputPort {
    pub fn new(device: Box<dyn OutputDevice>) -> Self {
        Self {
            address: Register::new("OA", true),
            action: BusAction::None,
            device,
        }
    }

    pub fn address(&self) -> &Register {
        &self.address
    }

    pub fn address_mut(&mut self) -> &mut Register {
        &mut self.address
    }

    pub fn device(&self) -> &dyn OutputDevice {
        self.device.as_ref()
    }

    pub fn process_command(&mut self, command: u8) {
        self.device.process_command(command);
    }

    pub fn reset(&mut self) {
        self.address.reset(0);
        self.action = BusAction::None;
        self.device.reset();
    }
}

impl Default for OutputPort {
    fn default() -> Self {
        Self::new(Box::new(StandardOutput::new()))
    }
}

impl BusConnectable for OutputPort {
    fn mark_transmit(&mut self) -> EResult<()> {
        Err(EmuError::ReadForbidden("OD"))
    }

    fn mark_receive(&mut self) {
        self.action = BusAction::Receive;
    }

    fn resolve_cycle(&mut self, bus: &mut Bus) -> EResult<()> {
        if std::mem::take(&mut self.action) == BusAction::Receive {
            let data = bus.receive()?;
            self.device.process_data(self.address.value(), data);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        let mut out = StandardOutput::new();
        assert!(!out.lcd_on());
        assert!(!out.screen_on());
        assert_eq!(out.render(), "");
        out.process_command(0b100);
        assert!(!out.lcd_on());
        assert!(out.screen_on());
        out.process_command(0b010);
        assert!(out.lcd_on());
        assert!(!out.screen_on());
    }

    #[test]
    fn test_lcd_characters() {
        let mut out = StandardOutput::new();
        out.process_data(0x20, b'H');
        out.process_data(0x21, b'i');
        out.process_data(0x3F, b'!');
        out.process_data(0x22, b'\n');
        assert_eq!(out.lcd_line(0), "Hi              ");
        assert_eq!(out.lcd_line(1), "               !");
    }

    #[test]
    fn test_pixel_rows() {
        let mut out = StandardOutput::new();
        out.process_data(0x10, 0b1000_0001);
        out.process_data(0x17, 0xFF);
        // rows past the screen are ignored
        out.process_data(0x18, 0xFF);
        assert!(out.pixel(0, 0));
        assert!(!out.pixel(0, 1));
        assert!(out.pixel(0, 7));
        assert!((0..8).all(|col| out.pixel(7, col)));
        out.process_command(0b110);
        assert_eq!(out.render().lines().count(), 10);
        out.reset();
        assert_eq!(out, StandardOutput::new());
        assert!(!out.lcd_on() && !out.screen_on());
    }

    #[test]
    fn test_port_forwards_data() {
        let mut bus = Bus::new();
        let mut port = OutputPort::default();
        port.process_command(0b010);
        port.address_mut().set(0x25);
        bus.transmit(b'A').unwrap();
        port.mark_receive();
        port.resolve_cycle(&mut bus).unwrap();
        assert!(port.device().render().starts_with("_____A"));
        assert_eq!(port.mark_transmit(), Err(EmuError::ReadForbidden("OD")));
    }
}
