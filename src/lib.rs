//! SA2: a microcoded 8-bit CPU emulator and its two-pass assembler.

pub mod asm;
pub mod emu;
pub mod plat;
