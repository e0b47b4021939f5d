//! Reprograms the status registers of an SPI NOR flash and erases it, talking
//! to the chip directly through the RP2040 XIP SSI FIFOs.
//!
//! Before any of this runs the flash pads must be connected to the SSI and the
//! flash must have left execute-in-place mode; afterwards that must be undone
//! before code can run from flash again. Neither step lives here.
//!
//! Every wait is a spin loop. The only way to stop one early is the abort
//! request a debug host latches into the QSPI SD1 pad override, which the
//! driver polls.
//!
//! The transfer loop has a budget of roughly 48 cycles per byte. Nothing in
//! the language enforces that; it holds as long as the loop keeps to two
//! FIFO level reads per pass and only touches the abort pad when idle, which
//! the tests check against a simulated register block.
#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod comms;
pub mod erase;
pub mod error;
pub mod rp2040;
pub mod ssi;
pub mod traits;

#[cfg(test)]
mod sim;

pub use comms::{JedecId, Opcode, Status};
pub use erase::{EraseStep, SR2_CLEARED, SR3_DRIVE_STRENGTH_75};
pub use error::{Error, Interruption};
pub use rp2040::Rp2040Ssi;
pub use ssi::{FlashSsi, OutOver, Payload};
pub use traits::SsiRegisters;
