//! Chip-select control, the abort check and the FIFO transport.
//!
//! The flash routines may be interrupted for long stretches (e.g. USB mass
//! storage handlers running alongside programming), so chip select is driven
//! manually through the pad override and FIFO occupancy is always sampled from
//! hardware rather than tracked with a local counter.

use core::fmt::Debug;

use crate::error::Error;
use crate::traits::SsiRegisters;

pub(crate) const SS_CTRL_OUTOVER_LSB: u32 = 8;
pub(crate) const SS_CTRL_OUTOVER_BITS: u32 = 0x0000_0300;
pub(crate) const SD1_CTRL_INOVER_BITS: u32 = 0x0003_0000;

/// Frames the SSI holds outside its FIFOs (shift registers), subtracted from
/// the FIFO depth to get the in-flight budget.
const SSI_INTERNAL_FRAMES: u32 = 2;

/// Pad output override, as encoded in the OUTOVER field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum OutOver {
    Normal = 0,
    Invert = 1,
    Low = 2,
    High = 3,
}

impl OutOver {
    /// Decodes the OUTOVER field of a GPIO_QSPI_SS_CTRL value.
    pub fn from_ss_ctrl(value: u32) -> Self {
        match (value & SS_CTRL_OUTOVER_BITS) >> SS_CTRL_OUTOVER_LSB {
            0 => OutOver::Normal,
            1 => OutOver::Invert,
            2 => OutOver::Low,
            _ => OutOver::High,
        }
    }
}

/// Buffers for one call to [`FlashSsi::put_get`].
///
/// Anything sent beyond the end of a transmit buffer is zero; anything
/// received beyond the end of a receive buffer is dropped.
pub enum Payload<'a> {
    /// Clock `n` zero bytes, drop everything received.
    Idle(usize),
    Write(&'a [u8]),
    /// Clock zeroes, keep what comes back.
    Read(&'a mut [u8]),
    /// Separate transmit and receive buffers; `max(tx.len(), rx.len())` bytes.
    Transfer { tx: &'a [u8], rx: &'a mut [u8] },
    /// Transmit the buffer and overwrite it with the received bytes.
    InPlace(&'a mut [u8]),
}

impl Payload<'_> {
    /// Number of bytes this payload clocks over the bus.
    pub fn len(&self) -> usize {
        match self {
            Payload::Idle(count) => *count,
            Payload::Write(tx) => tx.len(),
            Payload::Read(rx) => rx.len(),
            Payload::Transfer { tx, rx } => tx.len().max(rx.len()),
            Payload::InPlace(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    fn tx_byte(&self, index: usize) -> u8 {
        match self {
            Payload::Write(tx) | Payload::Transfer { tx, .. } => {
                tx.get(index).copied().unwrap_or(0)
            }
            Payload::InPlace(buf) => buf.get(index).copied().unwrap_or(0),
            Payload::Idle(_) | Payload::Read(_) => 0,
        }
    }

    #[inline(always)]
    fn store(&mut self, index: usize, byte: u8) {
        match self {
            Payload::Read(rx) | Payload::Transfer { rx, .. } | Payload::InPlace(rx) => {
                if let Some(slot) = rx.get_mut(index) {
                    *slot = byte;
                }
            }
            Payload::Idle(_) | Payload::Write(_) => {}
        }
    }
}

/// SPI NOR flash driven directly through the SSI FIFOs.
///
/// Owns the register binding; the caller must make sure nothing else uses the
/// bus while this value is alive.
pub struct FlashSsi<R> {
    pub(crate) regs: R,
}

impl<R> Debug for FlashSsi<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FlashSsi")
    }
}

impl<R> FlashSsi<R>
where
    R: SsiRegisters,
{
    /// Wraps a register binding. Flash pads must already be routed to the SSI
    /// and the flash must be out of execute-in-place mode.
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Gives the register binding back.
    pub fn release(self) -> R {
        self.regs
    }

    /// True while the debug host holds the abort request. Sampled fresh on
    /// every call.
    #[inline(always)]
    pub fn is_aborted(&mut self) -> bool {
        self.regs.sd1_ctrl() & SD1_CTRL_INOVER_BITS != 0
    }

    /// Overrides the chip-select pad. The pad has changed state by the time
    /// this returns.
    #[inline(never)]
    pub fn cs_force(&mut self, over: OutOver) {
        let ctrl = self.regs.ss_ctrl();
        self.regs.set_ss_ctrl(
            (ctrl & !SS_CTRL_OUTOVER_BITS) | ((over as u32) << SS_CTRL_OUTOVER_LSB),
        );
        // Read back to flush the async bridge
        let _ = self.regs.ss_ctrl();
    }

    /// Asserts (drives low) or releases (drives high) chip select.
    pub fn set_select(&mut self, active: bool) {
        self.cs_force(if active { OutOver::Low } else { OutOver::High });
    }

    /// Streams `payload` through the FIFOs, then releases chip select.
    ///
    /// The first `rx_skip` received bytes are dropped before anything lands in
    /// the receive buffer; use this for command and address bytes written to
    /// DR0 just before the call.
    ///
    /// Sent-but-not-received data is kept at or below `fifo_depth - 2` so a
    /// long interruption cannot overflow the receive FIFO. Both levels are
    /// re-read on every pass. The abort pad is only sampled on passes that
    /// moved nothing: the APB load costs 4 cycles and the budget is about 48
    /// cycles per byte.
    ///
    /// With [`Payload::InPlace`] byte `i` is always transmitted before the
    /// byte received at position `i` is stored, so the buffer may be both
    /// source and destination.
    ///
    /// Returns the number of payload bytes exchanged. On abort the counts of
    /// bytes sent and stored so far are reported in [`Error::Aborted`] and
    /// the remainder of the buffers is left untouched.
    #[inline(never)]
    pub fn put_get(
        &mut self,
        mut payload: Payload<'_>,
        mut rx_skip: usize,
    ) -> Result<usize, Error> {
        let depth = self.regs.fifo_depth();
        debug_assert!(depth > SSI_INTERNAL_FRAMES, "FIFO depth {} too small", depth);
        let max_in_flight = depth.saturating_sub(SSI_INTERNAL_FRAMES);
        let count = payload.len();
        let mut sent = 0;
        let mut received = 0;
        let outcome = loop {
            if sent == count && rx_skip == 0 && received == count {
                break Ok(count);
            }
            // NB order of reads, for pessimism rather than optimism
            let tx_level = self.regs.txflr();
            let rx_level = self.regs.rxflr();
            let mut progressed = false;
            if sent < count && tx_level + rx_level < max_in_flight {
                self.regs.write_dr0(payload.tx_byte(sent));
                sent += 1;
                progressed = true;
            }
            if rx_level != 0 && (rx_skip != 0 || received < count) {
                let byte = self.regs.read_dr0();
                progressed = true;
                if rx_skip != 0 {
                    rx_skip -= 1;
                } else {
                    payload.store(received, byte);
                    received += 1;
                }
            }
            if !progressed && self.is_aborted() {
                break Err(Error::Aborted { sent, received });
            }
        };
        self.cs_force(OutOver::High);
        outcome
    }
}
