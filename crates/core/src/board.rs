use crate::bus::SystemBus;
use crate::observer::BusObserver;
use crate::peripherals::uart::{self, Fcr, Lcr, Lsr};
use crate::platform::{Console, Mmio, Platform};
use crate::{Bus, SimulationError};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zynqwired_config::{BoardDescriptor, UartConfig};

/// Upper bound on LSR polls before a transmit proceeds regardless.
const UART_POLL_LIMIT: usize = 1000;

const MCR_DTR_RTS: u8 = 0x03;

/// A simulated board implementing the platform capabilities on top of a [`SystemBus`].
///
/// Bus faults never reach the caller: they are logged, recorded and reported to
/// observers, writes are dropped and reads return zero.
#[derive(Debug)]
pub struct SimBoard {
    pub name: String,
    pub bus: SystemBus,
    pub observers: Vec<Arc<dyn BusObserver>>,
    uart: UartConfig,
    faults: Vec<SimulationError>,
}

impl SimBoard {
    pub fn new(name: impl Into<String>, bus: SystemBus, uart: UartConfig) -> Self {
        Self {
            name: name.into(),
            bus,
            observers: Vec::new(),
            uart,
            faults: Vec::new(),
        }
    }

    pub fn from_config(board: &BoardDescriptor, echo_uart: bool) -> anyhow::Result<Self> {
        let bus = SystemBus::from_config(board, echo_uart)?;
        Ok(Self::new(board.name.clone(), bus, board.uart.clone()))
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BusObserver>) {
        self.observers.push(observer);
    }

    pub fn uart_config(&self) -> &UartConfig {
        &self.uart
    }

    /// Everything transmitted on the console UART so far.
    pub fn uart_output(&self) -> String {
        self.bus
            .uart()
            .map(|u| u.tx_string())
            .unwrap_or_default()
    }

    pub fn faults(&self) -> &[SimulationError] {
        &self.faults
    }

    fn fault(&mut self, error: SimulationError) {
        warn!("Bus fault ignored: {}", error);
        for observer in &self.observers {
            observer.on_fault(&error);
        }
        self.faults.push(error);
    }

    fn uart_reg_addr(&self, reg: u64) -> u64 {
        self.uart.base_address + reg * uart::REG_STRIDE
    }

    fn uart_write(&mut self, reg: u64, value: u8) {
        let addr = self.uart_reg_addr(reg);
        if let Err(e) = self.bus.write_u8(addr, value) {
            self.fault(e);
        }
    }

    fn uart_status(&mut self) -> Lsr {
        match self.bus.read_u8(self.uart_reg_addr(uart::REG_LSR)) {
            Ok(v) => Lsr::from_bits_truncate(v),
            Err(e) => {
                self.fault(e);
                Lsr::empty()
            }
        }
    }

    fn wait_for(&mut self, flag: Lsr) {
        for _ in 0..UART_POLL_LIMIT {
            if self.uart_status().contains(flag) {
                return;
            }
        }
        warn!("UART never reported {:?}", flag);
    }
}

impl Platform for SimBoard {
    fn init(&mut self) {
        let divisor = self.uart.divisor().unwrap_or_else(|| {
            warn!(
                "{} baud is out of reach of a {} Hz UART clock, divisor latch left clear",
                self.uart.baud_rate, self.uart.clock_hz
            );
            0
        });
        info!(
            "Initializing platform {}: UART at {:#x}, {} baud (divisor {})",
            self.name, self.uart.base_address, self.uart.baud_rate, divisor
        );

        let [dll, dlm] = divisor.to_le_bytes();
        self.uart_write(uart::REG_IER, 0);
        self.uart_write(uart::REG_LCR, Lcr::DLAB.bits());
        self.uart_write(uart::REG_THR, dll);
        self.uart_write(uart::REG_IER, dlm);
        self.uart_write(uart::REG_LCR, Lcr::EIGHT_N_ONE.bits());
        self.uart_write(
            uart::REG_FCR,
            (Fcr::ENABLE | Fcr::RX_RESET | Fcr::TX_RESET).bits(),
        );
        self.uart_write(uart::REG_MCR, MCR_DTR_RTS);
    }

    fn post_config(&mut self) {
        info!("Enabling PS-PL bridges");
        self.bus.fabric_enabled = true;
    }

    fn cleanup(&mut self) {
        self.wait_for(Lsr::TEMT);
        self.uart_write(uart::REG_FCR, 0);
        info!("Platform cleaned up ({} bus faults)", self.faults.len());
    }
}

impl Console for SimBoard {
    fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.wait_for(Lsr::THRE);
            self.uart_write(uart::REG_THR, byte);
        }
    }
}

impl Mmio for SimBoard {
    fn write32(&mut self, addr: u32, value: u32) {
        debug!("MMIO write {:#010x} <- {:#010x}", addr, value);
        for observer in &self.observers {
            observer.on_write32(addr, value);
        }
        if let Err(e) = self.bus.write_u32(addr as u64, value) {
            self.fault(e);
        }
    }

    fn read32(&mut self, addr: u32) -> u32 {
        let value = match self.bus.read_u32(addr as u64) {
            Ok(v) => v,
            Err(e) => {
                self.fault(e);
                0
            }
        };
        debug!("MMIO read  {:#010x} -> {:#010x}", addr, value);
        for observer in &self.observers {
            observer.on_read32(addr, value);
        }
        value
    }
}
