use crate::plat::MEMORY_SIZE;

use super::{
    bus::Bus,
    registers::{BusAction, BusConnectable, Register},
    EResult, EmuError,
};

/// The 256-byte main memory, addressed through its own address pointer register (MA).
#[derive(Debug, Clone)]
pub struct Ram {
    cells: [u8; MEMORY_SIZE],
    address: Register,
    action: BusAction,
}

impl Ram {
    /// Creates a new [`Ram`] with every cell zeroed.
    pub fn new() -> Self {
        Self {
            cells: [0; MEMORY_SIZE],
            address: Register::new("MA", true),
            action: BusAction::None,
        }
    }

    /// The cell the address pointer currently selects.
    pub fn read(&self) -> u8 {
        self.cells[self.address.value() as usize]
    }

    /// Overwrites the cell the address pointer currently selects.
    pub fn write(&mut self, value: u8) {
        self.cells[self.address.value() as usize] = value;
    }

    pub fn address(&self) -> &Register {
        &self.address
    }

    pub fn address_mut(&mut self) -> &mut Register {
        &mut self.address
    }

    pub fn cells(&self) -> &[u8; MEMORY_SIZE] {
        &self.cells
    }

    /// Replaces the whole memory contents.
    ///
    /// # Errors
    ///
    /// Fails with [`EmuError::SizeMismatch`] unless `image` holds exactly 256 bytes. Memory is
    /// left untouched in that case.
    pub fn load_image(&mut self, image: &[u8]) -> EResult<()> {
        if image.len() != MEMORY_SIZE {
            return Err(EmuError::SizeMismatch {
                expected: MEMORY_SIZE,
                found: image.len(),
            });
        }
        self.cells.copy_from_slice(image);
        Ok(())
    }

    /// Copies `bytes` into memory starting at `offset`, leaving the other cells alone.
    ///
    /// # Errors
    ///
    /// Fails with [`EmuError::SizeMismatch`] if the bytes run past the end of memory.
    pub fn load_at(&mut self, bytes: &[u8], offset: u8) -> EResult<()> {
        let start = offset as usize;
        let available = MEMORY_SIZE - start;
        if bytes.len() > available {
            return Err(EmuError::SizeMismatch {
                expected: available,
                found: bytes.len(),
            });
        }
        self.cells[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Zeroes every cell and the address pointer.
    pub fn reset(&mut self) {
        self.cells = [0; MEMORY_SIZE];
        self.address.reset(0);
        self.action = BusAction::None;
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl BusConnectable for Ram {
    fn mark_transmit(&mut self) -> EResult<()> {
        self.action = BusAction::Transmit;
        Ok(())
    }

    fn mark_receive(&mut self) {
        self.action = BusAction::Receive;
    }

    fn resolve_cycle(&mut self, bus: &mut Bus) -> EResult<()> {
        match std::mem::take(&mut self.action) {
            BusAction::None => {}
            BusAction::Transmit => bus.transmit(self.read())?,
            BusAction::Receive => {
                let value = bus.receive()?;
                self.write(value);
            }
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

/// Parses a memory image: whitespace separated two-digit hex bytes, exactly 256 of them, in
/// address order.
///
/// # Errors
///
/// [`EmuError::ImageSyntax`] for a token that is not a hex byte, [`EmuError::SizeMismatch`] for
/// the wrong token count.
pub fn parse_image(text: &str) -> EResult<[u8; MEMORY_SIZE]> {
    let mut image = [0u8; MEMORY_SIZE];
    let mut count = 0;
    for (index, token) in text.split_whitespace().enumerate() {
        let byte = Some(token)
            .filter(|t| t.len() == 2 && t.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|t| u8::from_str_radix(t, 16).ok())
            .ok_or_else(|| EmuError::ImageSyntax {
                index,
                token: token.to_owned(),
            })?;
        if index < MEMORY_SIZE {
            image[index] = byte;
        }
        count += 1;
    }
    if count != MEMORY_SIZE {
        return Err(EmuError::SizeMismatch {
            expected: MEMORY_SIZE,
            found: count,
        });
    }
    Ok(image)
}

/// Formats bytes as a memory image, 16 two-digit hex bytes per line.
pub fn format_image(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for line in bytes.chunks(16) {
        let line = line
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_at_pointer() {
        let mut ram = Ram::new();
        ram.address_mut().set(0x42);
        ram.write(7);
        assert_eq!(ram.read(), 7);
        assert_eq!(ram.cells()[0x42], 7);
        ram.address_mut().set(0x43);
        assert_eq!(ram.read(), 0);
    }

    #[test]
    fn test_bus_participation() {
        let mut bus = Bus::new();
        let mut ram = Ram::new();
        ram.address_mut().set(3);
        ram.write(0x99);
        ram.mark_transmit().unwrap();
        ram.resolve_cycle(&mut bus).unwrap();
        assert_eq!(bus.receive(), Ok(0x99));
        assert!(!ram.is_acting());

        bus.clock_reset();
        bus.transmit(0x11).unwrap();
        ram.address_mut().set(4);
        ram.mark_receive();
        ram.resolve_cycle(&mut bus).unwrap();
        assert_eq!(ram.cells()[4], 0x11);
    }

    #[test]
    fn test_load_image_size() {
        let mut ram = Ram::new();
        assert_eq!(
            ram.load_image(&[1, 2, 3]),
            Err(EmuError::SizeMismatch {
                expected: 256,
                found: 3
            })
        );
        assert_eq!(ram.cells()[0], 0);
        ram.load_image(&[0xAB; 256]).unwrap();
        assert!(ram.cells().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_load_at() {
        let mut ram = Ram::new();
        ram.load_at(&[1, 2], 0xFE).unwrap();
        assert_eq!(&ram.cells()[0xFE..], &[1, 2]);
        assert!(ram.load_at(&[1, 2, 3], 0xFE).is_err());
    }

    #[test]
    fn test_image_text() {
        let mut bytes = [0u8; 256];
        bytes[0] = 0x12;
        bytes[1] = 0x05;
        bytes[255] = 0xFF;
        let text = format_image(&bytes);
        assert_eq!(text.lines().count(), 16);
        assert!(text.starts_with("12 05 00"));
        assert_eq!(parse_image(&text), Ok(bytes));

        assert_eq!(
            parse_image("00 zz"),
            Err(EmuError::ImageSyntax {
                index: 1,
                token: "zz".into()
            })
        );
        // each byte is exactly two hex digits
        for token in ["+f", "f", "0ff"] {
            assert_eq!(
                parse_image(&format!("{token} 00")),
                Err(EmuError::ImageSyntax {
                    index: 0,
                    token: token.into()
                })
            );
        }
        assert_eq!(
            parse_image("00 01\n02"),
            Err(EmuError::SizeMismatch {
                expected: 256,
                found: 3
            })
        );
    }
}
