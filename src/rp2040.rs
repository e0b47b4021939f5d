//! Register binding for the RP2040 XIP SSI and QSPI pad controls.

use rp2040_pac::{IO_QSPI, XIP_SSI};

use crate::traits::SsiRegisters;

/// The XIP SSI and the QSPI pad control block, owned for the duration of a
/// flash maintenance run.
///
/// Flash pads must already be connected to the SSI and the flash must be out
/// of execute-in-place mode. Nothing may run from flash while this is in use.
pub struct Rp2040Ssi {
    ssi: XIP_SSI,
    io: IO_QSPI,
}

impl Rp2040Ssi {
    pub fn new(ssi: XIP_SSI, io: IO_QSPI) -> Self {
        Self { ssi, io }
    }

    /// Hands the peripherals back, e.g. to re-enter execute-in-place mode.
    pub fn free(self) -> (XIP_SSI, IO_QSPI) {
        (self.ssi, self.io)
    }
}

impl SsiRegisters for Rp2040Ssi {
    #[inline(always)]
    fn txflr(&mut self) -> u32 {
        self.ssi.txflr().read().bits()
    }

    #[inline(always)]
    fn rxflr(&mut self) -> u32 {
        self.ssi.rxflr().read().bits()
    }

    #[inline(always)]
    fn write_dr0(&mut self, byte: u8) {
        self.ssi.dr0().write(|w| unsafe { w.bits(u32::from(byte)) });
    }

    #[inline(always)]
    fn read_dr0(&mut self) -> u8 {
        // Frames are 8 bits wide, upper bits read as zero
        self.ssi.dr0().read().bits() as u8
    }

    fn ss_ctrl(&mut self) -> u32 {
        self.io.gpio_qspiss().gpio_ctrl().read().bits()
    }

    fn set_ss_ctrl(&mut self, value: u32) {
        self.io.gpio_qspiss().gpio_ctrl().write(|w| unsafe { w.bits(value) });
    }

    fn sd1_ctrl(&mut self) -> u32 {
        self.io.gpio_qspisd1().gpio_ctrl().read().bits()
    }
}
