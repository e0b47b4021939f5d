//! In-memory model of the SSI, the QSPI pad controls and a Winbond-style
//! flash part, for host tests.

use std::collections::VecDeque;

use crate::ssi::{OutOver, SD1_CTRL_INOVER_BITS, SS_CTRL_OUTOVER_LSB};
use crate::traits::SsiRegisters;

const SIM_FLASH_SIZE: usize = 64 * 1024;
const SIM_SECTOR_SIZE: usize = 4096;
const SIM_PAGE_SIZE: usize = 256;

pub const SIM_JEDEC_ID: [u8; 3] = [0xef, 0x40, 0x16];
pub const SIM_SFDP: [u8; 8] = [b'S', b'F', b'D', b'P', 0x06, 0x01, 0x01, 0xff];

/// One chip-select frame as seen by the flash: the opcode and every byte
/// clocked in after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub data: Vec<u8>,
}

pub struct SimFlash {
    pub memory: Vec<u8>,
    /// Status register 1 without the BUSY and WEL bits.
    pub sr1: u8,
    pub sr2: u8,
    pub sr3: u8,
    pub wel: bool,
    volatile_wel: bool,
    /// Status polls left before BUSY clears.
    busy: usize,
    pub erase_polls: usize,
    pub sector_erase_polls: usize,
    pub program_polls: usize,
    pub status_write_polls: usize,
    selected: bool,
    frame: Vec<u8>,
    pub trace: Vec<Frame>,
}

impl SimFlash {
    fn new() -> Self {
        Self {
            memory: vec![0x00; SIM_FLASH_SIZE],
            sr1: 0,
            sr2: 0,
            sr3: 0,
            wel: false,
            volatile_wel: false,
            busy: 0,
            erase_polls: 5,
            sector_erase_polls: 3,
            program_polls: 1,
            status_write_polls: 2,
            selected: false,
            frame: Vec::new(),
            trace: Vec::new(),
        }
    }

    /// Makes the next `polls` status reads report BUSY.
    pub fn set_busy(&mut self, polls: usize) {
        self.busy = polls;
    }

    pub fn is_busy(&self) -> bool {
        self.busy != 0
    }

    pub fn status1(&self) -> u8 {
        (self.sr1 & !0x03) | (u8::from(self.wel) << 1) | u8::from(self.busy != 0)
    }

    fn frame_addr(&self) -> usize {
        match self.frame.get(1..4) {
            Some(a) => (usize::from(a[0]) << 16) | (usize::from(a[1]) << 8) | usize::from(a[2]),
            None => 0,
        }
    }

    fn select(&mut self) {
        self.selected = true;
        self.frame.clear();
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        let index = self.frame.len();
        self.frame.push(byte);
        if index == 0 {
            return 0xff;
        }
        match self.frame[0] {
            0x05 => self.status1(),
            0x35 => self.sr2,
            0x15 => self.sr3,
            0x9f => SIM_JEDEC_ID.get(index - 1).copied().unwrap_or(0xff),
            0x03 if index >= 4 => self.memory[(self.frame_addr() + index - 4) % SIM_FLASH_SIZE],
            0x5a if index >= 5 => SIM_SFDP
                .get(self.frame_addr() + index - 5)
                .copied()
                .unwrap_or(0xff),
            _ => 0xff,
        }
    }

    fn deselect(&mut self) {
        if !self.selected {
            return;
        }
        self.selected = false;
        if self.frame.is_empty() {
            return;
        }
        let addr = self.frame_addr();
        let opcode = self.frame[0];
        let data = self.frame[1..].to_vec();
        self.execute(opcode, addr, &data);
        self.trace.push(Frame { opcode, data });
    }

    fn execute(&mut self, opcode: u8, addr: usize, data: &[u8]) {
        if self.busy != 0 {
            // Only status reads get through while an operation runs
            if opcode == 0x05 {
                self.busy -= 1;
            }
            return;
        }
        match opcode {
            0x06 => self.wel = true,
            0x50 => self.volatile_wel = true,
            0x01 | 0x31 | 0x11 if !data.is_empty() => {
                if self.wel || self.volatile_wel {
                    match opcode {
                        0x01 => self.sr1 = data[0] & !0x03,
                        0x31 => self.sr2 = data[0],
                        _ => self.sr3 = data[0],
                    }
                    if self.wel {
                        self.busy = self.status_write_polls;
                    }
                }
                self.wel = false;
                self.volatile_wel = false;
            }
            0xc7 if self.wel => {
                self.memory.fill(0xff);
                self.busy = self.erase_polls;
                self.wel = false;
            }
            0x20 if self.wel && data.len() >= 3 => {
                let start = (addr % SIM_FLASH_SIZE) & !(SIM_SECTOR_SIZE - 1);
                self.memory[start..start + SIM_SECTOR_SIZE].fill(0xff);
                self.busy = self.sector_erase_polls;
                self.wel = false;
            }
            0x02 if self.wel && data.len() >= 3 => {
                let page = (addr % SIM_FLASH_SIZE) & !(SIM_PAGE_SIZE - 1);
                for (i, byte) in data[3..].iter().enumerate() {
                    let offset = (addr + i) % SIM_PAGE_SIZE;
                    self.memory[page + offset] &= byte;
                }
                self.busy = self.program_polls;
                self.wel = false;
            }
            _ => {}
        }
    }
}

/// SSI with a shifter that moves one frame per TXFLR read, optionally
/// stalling or draining the whole transmit FIFO at once to mimic the CPU
/// being away in an interrupt handler.
pub struct SimSsi {
    depth: u32,
    tx: VecDeque<u8>,
    rx: VecDeque<u8>,
    ss_ctrl: u32,
    sd1_ctrl: u32,
    pub flash: SimFlash,
    script: Option<VecDeque<u8>>,
    stall_after: Option<usize>,
    preempt_every: usize,
    ticks: usize,
    wire_out: Vec<u8>,
    max_in_flight: usize,
    overflowed: bool,
    txflr_reads: usize,
    rxflr_reads: usize,
    ss_ctrl_reads: usize,
    sd1_reads: usize,
}

impl SimSsi {
    pub fn new() -> Self {
        Self::with_depth(16)
    }

    pub fn with_depth(depth: u32) -> Self {
        Self {
            depth,
            tx: VecDeque::new(),
            rx: VecDeque::new(),
            ss_ctrl: (OutOver::High as u32) << SS_CTRL_OUTOVER_LSB,
            sd1_ctrl: 0,
            flash: SimFlash::new(),
            script: None,
            stall_after: None,
            preempt_every: 0,
            ticks: 0,
            wire_out: Vec::new(),
            max_in_flight: 0,
            overflowed: false,
            txflr_reads: 0,
            rxflr_reads: 0,
            ss_ctrl_reads: 0,
            sd1_reads: 0,
        }
    }

    /// Replaces the flash replies with these bytes, then zeroes.
    pub fn script(&mut self, replies: &[u8]) {
        self.script = Some(replies.iter().copied().collect());
    }

    /// The shifter stops for good once this many frames have gone out.
    pub fn stall_after(&mut self, frames: usize) {
        self.stall_after = Some(frames);
    }

    /// Every `ticks` TXFLR reads the shifter empties the transmit FIFO in one
    /// go. Zero disables this.
    pub fn preempt_every(&mut self, ticks: usize) {
        self.preempt_every = ticks;
    }

    pub fn set_abort(&mut self, abort: bool) {
        if abort {
            self.sd1_ctrl |= SD1_CTRL_INOVER_BITS;
        } else {
            self.sd1_ctrl &= !SD1_CTRL_INOVER_BITS;
        }
    }

    pub fn poke_ss_ctrl(&mut self, value: u32) {
        self.ss_ctrl = value;
    }

    pub fn peek_ss_ctrl(&self) -> u32 {
        self.ss_ctrl
    }

    pub fn chip_select(&self) -> OutOver {
        OutOver::from_ss_ctrl(self.ss_ctrl)
    }

    pub fn wire_out(&self) -> &[u8] {
        &self.wire_out
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn txflr_reads(&self) -> usize {
        self.txflr_reads
    }

    pub fn rxflr_reads(&self) -> usize {
        self.rxflr_reads
    }

    pub fn ss_ctrl_reads(&self) -> usize {
        self.ss_ctrl_reads
    }

    pub fn sd1_reads(&self) -> usize {
        self.sd1_reads
    }

    fn tick(&mut self) {
        self.ticks += 1;
        let frames = if self.preempt_every != 0 && self.ticks % self.preempt_every == 0 {
            self.tx.len()
        } else {
            1
        };
        for _ in 0..frames {
            self.shift();
        }
    }

    fn shift(&mut self) {
        if self.stall_after.is_some_and(|limit| self.wire_out.len() >= limit) {
            return;
        }
        let Some(byte) = self.tx.pop_front() else {
            return;
        };
        self.wire_out.push(byte);
        let mut reply = if self.chip_select() == OutOver::Low {
            self.flash.exchange(byte)
        } else {
            0xff
        };
        if let Some(script) = self.script.as_mut() {
            reply = script.pop_front().unwrap_or(0);
        }
        if self.rx.len() >= self.depth as usize {
            self.overflowed = true;
        } else {
            self.rx.push_back(reply);
        }
    }
}

impl SsiRegisters for SimSsi {
    fn txflr(&mut self) -> u32 {
        self.txflr_reads += 1;
        self.tick();
        self.tx.len() as u32
    }

    fn rxflr(&mut self) -> u32 {
        self.rxflr_reads += 1;
        self.rx.len() as u32
    }

    fn write_dr0(&mut self, byte: u8) {
        if self.tx.len() >= self.depth as usize {
            self.overflowed = true;
            return;
        }
        self.tx.push_back(byte);
        self.max_in_flight = self.max_in_flight.max(self.tx.len() + self.rx.len());
    }

    fn read_dr0(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }

    fn ss_ctrl(&mut self) -> u32 {
        self.ss_ctrl_reads += 1;
        self.ss_ctrl
    }

    fn set_ss_ctrl(&mut self, value: u32) {
        let before = self.chip_select();
        self.ss_ctrl = value;
        let after = self.chip_select();
        if before != OutOver::Low && after == OutOver::Low {
            self.flash.select();
        } else if before == OutOver::Low && after != OutOver::Low {
            self.flash.deselect();
        }
    }

    fn sd1_ctrl(&mut self) -> u32 {
        self.sd1_reads += 1;
        self.sd1_ctrl
    }

    fn fifo_depth(&self) -> u32 {
        self.depth
    }
}
