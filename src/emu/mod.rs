//! The emulator/debugger module for SA2.

use thiserror::Error;

use crate::plat::{STACK_SIZE, STACK_START};

pub mod alu;
pub mod bus;
pub mod coordinator;
pub mod debugger;
pub mod emulator;
pub mod machine;
pub mod microcode;
pub mod observer;
pub mod output;
pub mod ram;
pub mod registers;

/// Errors raised by the machine model. All of them are fatal to the step that detected them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmuError {
    #[error("short circuit: bus already holds {held:#04x}, refused {rejected:#04x}")]
    BusConflict { held: u8, rejected: u8 },
    #[error("read from unwritten bus")]
    BusUnwritten,
    #[error("register {0} cannot transmit")]
    ReadForbidden(&'static str),
    #[error("memory image has {found} bytes, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("stack pointer {sp:#04x} left the stack region below {top:#04x}")]
    StackOverflow { sp: u8, top: u8 },
    #[error("memory image token {index} is not a hex byte: {token:?}")]
    ImageSyntax { index: usize, token: String },
}

/// Type alias for Result<T, [EmuError]>.
pub type EResult<T> = Result<T, EmuError>;

/// Machine construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Stack pointer value after reset.
    pub stack_start: u8,
    /// Number of bytes the stack may hold below its top.
    pub stack_size: u8,
    /// Raise [`EmuError::StackOverflow`] when the stack pointer leaves its region.
    pub enforce_stack_bounds: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            stack_start: STACK_START,
            stack_size: STACK_SIZE,
            enforce_stack_bounds: true,
        }
    }
}
