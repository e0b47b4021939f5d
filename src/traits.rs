/// The handful of serial controller and pad registers the flash routines touch.
///
/// Production code binds this to the memory-mapped registers (see
/// [`Rp2040Ssi`](crate::rp2040::Rp2040Ssi)); tests bind it to a simulator.
/// Every call is a fresh register access: implementations must not cache.
pub trait SsiRegisters {
    /// Transmit FIFO level (TXFLR).
    fn txflr(&mut self) -> u32;

    /// Receive FIFO level (RXFLR).
    fn rxflr(&mut self) -> u32;

    /// Push one frame into the transmit FIFO (DR0).
    fn write_dr0(&mut self, byte: u8);

    /// Pop one frame from the receive FIFO (DR0).
    fn read_dr0(&mut self) -> u8;

    /// Chip-select pad control register (GPIO_QSPI_SS_CTRL).
    fn ss_ctrl(&mut self) -> u32;

    /// Writes the chip-select pad control register.
    fn set_ss_ctrl(&mut self, value: u32);

    /// Data-line 1 pad control register (GPIO_QSPI_SD1_CTRL). A debug host
    /// latches the abort request into its INOVER field.
    fn sd1_ctrl(&mut self) -> u32;

    /// Depth of each hardware FIFO, in frames. Must be greater than 2: the
    /// SSI keeps two frames outside the FIFOs, and a budget of zero would
    /// never let a byte out.
    fn fifo_depth(&self) -> u32 {
        16
    }
}
