//! Full-chip erase plus status register reconfiguration.
//!
//! The sequence is not transactional. An abort part way through can leave
//! protection cleared with the array only partly erased; nothing here tries
//! to roll that back.

use crate::comms::Opcode;
use crate::error::Error;
use crate::ssi::{FlashSsi, Payload};
use crate::traits::SsiRegisters;

/// Status register 2 value written to clear the protection bits.
pub const SR2_CLEARED: u8 = 0x00;

/// Status register 3 value selecting 75% output driver strength. Board
/// specific.
pub const SR3_DRIVE_STRENGTH_75: u8 = 0x20;

/// Steps of [`FlashSsi::erase_and_reconfigure`], in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EraseStep {
    VolatileWriteEnable,
    /// Volatile SR2 write clearing protection for the current power cycle.
    UnlockVolatile,
    ChipErase,
    /// Non-volatile SR2 write.
    ClearProtection,
    /// Non-volatile SR3 write.
    SetDriveStrength,
}

impl<R> FlashSsi<R>
where
    R: SsiRegisters,
{
    /// Clears write protection, erases the whole chip, clears the
    /// non-volatile protection bits and sets the output driver strength.
    ///
    /// Runs every step in order and stops at the first one the abort signal
    /// interrupts, reporting it and the abort that caused it in
    /// [`Error::EraseInterrupted`].
    pub fn erase_and_reconfigure(&mut self) -> Result<(), Error> {
        self.erase_step(EraseStep::VolatileWriteEnable, |flash| {
            flash.command(Opcode::VolatileSrWriteEnable, Payload::Idle(0))?;
            Ok(())
        })?;
        self.erase_step(EraseStep::UnlockVolatile, |flash| {
            flash.write_status_register(Opcode::WriteStatus2, SR2_CLEARED)?;
            flash.wait_ready()?;
            Ok(())
        })?;
        self.erase_step(EraseStep::ChipErase, |flash| {
            flash.write_enable()?;
            flash.command(Opcode::ChipErase, Payload::Idle(0))?;
            flash.wait_ready()?;
            Ok(())
        })?;
        self.erase_step(EraseStep::ClearProtection, |flash| {
            flash.write_enable()?;
            flash.write_status_register(Opcode::WriteStatus2, SR2_CLEARED)?;
            flash.wait_ready()?;
            Ok(())
        })?;
        self.erase_step(EraseStep::SetDriveStrength, |flash| {
            flash.write_enable()?;
            flash.write_status_register(Opcode::WriteStatus3, SR3_DRIVE_STRENGTH_75)?;
            flash.wait_ready()?;
            Ok(())
        })?;
        info!("Flash erased and reconfigured");
        Ok(())
    }

    fn erase_step(
        &mut self,
        step: EraseStep,
        op: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<(), Error> {
        debug!("Erase step {:?}", step);
        op(self).map_err(|err| {
            warn!("Erase stopped at {:?}: {:?}", step, err);
            Error::EraseInterrupted {
                step,
                cause: err.interruption(),
            }
        })
    }
}
