/// Refer to datasheet:
/// https://datasheet.lcsc.com/lcsc/1912111437_Winbond-Elec-W25Q128JVSIQ_C113767.pdf
use crate::error::Error;
use crate::ssi::{FlashSsi, OutOver, Payload};
use crate::traits::SsiRegisters;
use hardware_traits::HardwareFlashDevice;

/// Command set shared by practically every 25-series SPI flash, plus the
/// Winbond status register commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    PageProgram = 0x02,
    ReadData = 0x03,
    /// Read status register 1.
    ReadStatus = 0x05,
    /// Set the write enable latch.
    WriteEnable = 0x06,
    /// Erase one 4K sector.
    SectorErase = 0x20,
    ReadSfdp = 0x5A,
    /// Read 8-bit manufacturer ID and 16-bit device ID.
    ReadJedecId = 0x9F,
    ChipErase = 0xC7,
    /// Lets the next status register write land in the volatile copy only.
    VolatileSrWriteEnable = 0x50,
    WriteStatus1 = 0x01,
    WriteStatus2 = 0x31,
    WriteStatus3 = 0x11,
    ReadStatus2 = 0x35,
    ReadStatus3 = 0x15,
}

bitflags::bitflags! {
    /// Status register 1 bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Erase or write in progress.
        const BUSY = 1 << 0;
        /// Status of the **W**rite **E**nable **L**atch.
        const WEL = 1 << 1;
        /// The 3 block protection bits.
        const PROT = 0b0001_1100;
        /// Top/bottom protect.
        const TB = 1 << 5;
        /// Sector/block protect.
        const SEC = 1 << 6;
        /// **S**tatus **R**egister **P**rotect.
        const SRP = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#x})", self.bits())
    }
}

/// Manufacturer and device identification returned by `9Fh`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JedecId {
    pub manufacturer: u8,
    /// Memory type in the high byte, capacity in the low byte.
    pub device: u16,
}

impl<R> FlashSsi<R>
where
    R: SsiRegisters,
{
    /// Selects the flash and runs one command.
    ///
    /// The opcode goes straight into DR0 ahead of the payload; a debug host
    /// cannot otherwise meet the timing between the command byte and the
    /// data. Its echo is skipped, so `payload` sees only the bytes after it.
    pub fn command(&mut self, opcode: Opcode, payload: Payload<'_>) -> Result<usize, Error> {
        self.cs_force(OutOver::Low);
        self.regs.write_dr0(opcode as u8);
        self.put_get(payload, 1)
    }

    /// Selects the flash and queues `opcode` followed by the 24-bit `addr`,
    /// most significant byte first. The caller finishes the frame with
    /// [`put_get`](Self::put_get) and an `rx_skip` of 4.
    #[inline(always)]
    pub fn command_addr(&mut self, opcode: Opcode, addr: u32) {
        self.cs_force(OutOver::Low);
        let mut word = (addr & 0x00ff_ffff) | ((opcode as u32) << 24);
        for _ in 0..4 {
            self.regs.write_dr0((word >> 24) as u8);
            word <<= 8;
        }
    }

    /// Reads status register 1.
    pub fn read_status(&mut self) -> Result<Status, Error> {
        let mut response = [0u8; 1];
        self.command(Opcode::ReadStatus, Payload::Read(&mut response))?;
        Ok(Status::from_bits_retain(response[0]))
    }

    /// Spin until the flash clears BUSY.
    ///
    /// There is no timeout: erase time is not known up front. The only way
    /// out of a stuck part is the abort signal, checked after every poll.
    pub fn wait_ready(&mut self) -> Result<Status, Error> {
        loop {
            let status = self.read_status()?;
            if !status.contains(Status::BUSY) {
                return Ok(status);
            }
            if self.is_aborted() {
                warn!("Aborted while flash busy: {:?}", status);
                return Err(Error::AbortedWhileBusy(status));
            }
        }
    }

    /// From datasheet section 8.2.1
    /// The Write Enable instruction sets the Write Enable Latch (WEL) bit
    /// in the Status Register to a 1. The WEL bit must be set prior to every Page Program,
    /// Quad Page Program, Sector Erase, Block Erase, Chip Erase, Write Status Register
    /// and Erase/Program Security Registers instruction.
    #[inline(never)]
    pub fn write_enable(&mut self) -> Result<(), Error> {
        self.command(Opcode::WriteEnable, Payload::Idle(0))?;
        Ok(())
    }

    /// Writes one byte to a status register. `opcode` must be one of the
    /// `WriteStatus*` commands and must be preceded by [`write_enable`](Self::write_enable)
    /// or `VolatileSrWriteEnable`.
    pub fn write_status_register(&mut self, opcode: Opcode, value: u8) -> Result<(), Error> {
        self.command(opcode, Payload::Write(&[value]))?;
        Ok(())
    }

    /// Status registers 1, 2 and 3 packed as `SR1 << 16 | SR2 << 8 | SR3`.
    /// Diagnostic only; the three reads are separate frames.
    pub fn read_status_composite(&mut self) -> Result<u32, Error> {
        let mut sr = 0u32;
        for opcode in [Opcode::ReadStatus, Opcode::ReadStatus2, Opcode::ReadStatus3] {
            let mut response = [0u8; 1];
            self.command(opcode, Payload::Read(&mut response))?;
            sr = (sr << 8) | u32::from(response[0]);
        }
        debug!("Composite status: {:#x}", sr);
        Ok(sr)
    }

    /// Reads the JEDEC manufacturer/device identification.
    pub fn read_jedec_id(&mut self) -> Result<JedecId, Error> {
        let mut response = [0u8; 3];
        self.command(Opcode::ReadJedecId, Payload::Read(&mut response))?;
        Ok(JedecId {
            manufacturer: response[0],
            device: u16::from_be_bytes([response[1], response[2]]),
        })
    }

    /// Reads the SFDP table starting at `addr` into `buf`. The command takes
    /// one dummy byte after the address.
    pub fn read_sfdp(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.command_addr(Opcode::ReadSfdp, addr);
        self.regs.write_dr0(0);
        self.put_get(Payload::Read(buf), 5)?;
        Ok(())
    }
}

impl<R> HardwareFlashDevice for FlashSsi<R>
where
    R: SsiRegisters,
{
    type Error = Error;

    /// From datasheet section 8.2.6 (Read Data (03h))
    /// Reads flash contents into `buf`, starting at `addr`.
    ///
    /// Only 24 bits of `addr` are transferred to the device, limiting the
    /// reachable range to 16 MiB.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.wait_ready()?;
        self.command_addr(Opcode::ReadData, addr);
        self.put_get(Payload::Read(buf), 4)?;
        Ok(())
    }

    /// Sector erase (see datasheet 8.2.15)
    /// The Sector Erase instruction sets all memory within a specified sector
    /// (4K-bytes) to the erased state of all 1s (FFh).
    fn sector_erase(&mut self, addr: u32) -> Result<(), Error> {
        self.wait_ready()?;
        self.write_enable()?;
        self.command_addr(Opcode::SectorErase, addr);
        self.put_get(Payload::Idle(0), 4)?;
        self.wait_ready()?;
        Ok(())
    }

    /// From datasheet section 8.2.13
    /// The Page Program instruction allows from one byte to 256 bytes (a page) of data
    /// to be programmed at previously erased (FFh) memory locations. Data past
    /// the end of the page wraps to its start.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        self.wait_ready()?;
        self.write_enable()?;
        self.command_addr(Opcode::PageProgram, addr);
        self.put_get(Payload::Write(data), 4)?;
        self.wait_ready()?;
        Ok(())
    }

    /// Chip Erase (see datasheet 8.2.18)
    /// The Chip Erase instruction sets all memory within the device to the erased
    /// state of all 1s (FFh).
    fn chip_erase(&mut self) -> Result<(), Error> {
        self.wait_ready()?;
        self.write_enable()?;
        self.command(Opcode::ChipErase, Payload::Idle(0))?;
        self.wait_ready()?;
        Ok(())
    }
}
