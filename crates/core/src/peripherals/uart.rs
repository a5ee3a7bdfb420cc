use crate::SimResult;
use bitflags::bitflags;
use std::any::Any;
use std::io::{self, Write};

/// Register index of each 16550 register; registers sit on a 4-byte stride.
pub const REG_THR: u64 = 0; // RBR on read, DLL with DLAB set
pub const REG_IER: u64 = 1; // DLM with DLAB set
pub const REG_FCR: u64 = 2; // IIR on read
pub const REG_LCR: u64 = 3;
pub const REG_MCR: u64 = 4;
pub const REG_LSR: u64 = 5;
pub const REG_MSR: u64 = 6;
pub const REG_SCR: u64 = 7;

pub const REG_STRIDE: u64 = 4;
pub const WINDOW_SIZE: u64 = 8 * REG_STRIDE;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u8 {
        const WLS0 = 0x01;
        const WLS1 = 0x02;
        const STB = 0x04;
        const PEN = 0x08;
        const EPS = 0x10;
        const STICK = 0x20;
        const BREAK = 0x40;
        const DLAB = 0x80;
        /// 8 data bits, no parity, 1 stop bit
        const EIGHT_N_ONE = Self::WLS0.bits() | Self::WLS1.bits();
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u8 {
        const DR = 0x01;
        const THRE = 0x20;
        const TEMT = 0x40;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u8 {
        const ENABLE = 0x01;
        const RX_RESET = 0x02;
        const TX_RESET = 0x04;
    }
}

/// 16550-compatible UART.
/// Transmitted bytes are captured and optionally echoed to stdout. Transmission is
/// instantaneous, so THRE and TEMT always read as set.
#[derive(Debug)]
pub struct Uart16550 {
    ier: u8,
    fcr: Fcr,
    lcr: Lcr,
    mcr: u8,
    scr: u8,
    dll: u8,
    dlm: u8,
    tx: Vec<u8>,
    echo_stdout: bool,
}

impl Uart16550 {
    pub fn new(echo_stdout: bool) -> Self {
        Self {
            ier: 0,
            fcr: Fcr::empty(),
            lcr: Lcr::empty(),
            mcr: 0,
            scr: 0,
            dll: 0,
            dlm: 0,
            tx: Vec::new(),
            echo_stdout,
        }
    }

    pub fn divisor(&self) -> u16 {
        u16::from_le_bytes([self.dll, self.dlm])
    }

    /// Effective baud rate, or None while the divisor latch is unprogrammed.
    pub fn baud_rate(&self, clock_hz: u32) -> Option<u32> {
        match self.divisor() {
            0 => None,
            d => Some(clock_hz / (16 * d as u32)),
        }
    }

    pub fn line_control(&self) -> Lcr {
        self.lcr
    }

    pub fn fifo_enabled(&self) -> bool {
        self.fcr.contains(Fcr::ENABLE)
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx
    }

    pub fn tx_string(&self) -> String {
        String::from_utf8_lossy(&self.tx).into_owned()
    }

    fn read_reg(&self, index: u64) -> u8 {
        let dlab = self.lcr.contains(Lcr::DLAB);
        match index {
            REG_THR if dlab => self.dll,
            REG_THR => 0, // RX is not modeled
            REG_IER if dlab => self.dlm,
            REG_IER => self.ier,
            // IIR: no interrupt pending, FIFO status in the top bits
            REG_FCR if self.fifo_enabled() => 0xC1,
            REG_FCR => 0x01,
            REG_LCR => self.lcr.bits(),
            REG_MCR => self.mcr,
            REG_LSR => (Lsr::THRE | Lsr::TEMT).bits(),
            REG_MSR => 0,
            REG_SCR => self.scr,
            _ => 0,
        }
    }

    fn write_reg(&mut self, index: u64, value: u8) {
        let dlab = self.lcr.contains(Lcr::DLAB);
        match index {
            REG_THR if dlab => self.dll = value,
            REG_THR => self.transmit(value),
            REG_IER if dlab => self.dlm = value,
            REG_IER => self.ier = value & 0x0F,
            REG_FCR => {
                // Reset bits self-clear
                self.fcr = Fcr::from_bits_truncate(value) & Fcr::ENABLE;
            }
            REG_LCR => self.lcr = Lcr::from_bits_retain(value),
            REG_MCR => self.mcr = value & 0x1F,
            REG_SCR => self.scr = value,
            _ => {}
        }
        tracing::debug!("UART: reg {} <- {:#04x}", index, value);
    }

    fn transmit(&mut self, value: u8) {
        self.tx.push(value);
        if self.echo_stdout {
            let mut stdout = io::stdout();
            let _ = stdout.write_all(&[value]);
            let _ = stdout.flush();
        }
    }
}

impl crate::Peripheral for Uart16550 {
    fn read(&self, offset: u64) -> SimResult<u8> {
        // Registers live in byte lane 0; the upper lanes read as zero.
        if offset % REG_STRIDE != 0 {
            return Ok(0);
        }
        Ok(self.read_reg(offset / REG_STRIDE))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset % REG_STRIDE == 0 {
            self.write_reg(offset / REG_STRIDE, value);
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}
