use crate::memory::BlockRam;
use crate::peripherals::bram::BramController;
use crate::peripherals::uart::{self, Uart16550};
use crate::{Peripheral, SimResult, SimulationError};
use anyhow::Context;
use zynqwired_config::{parse_size, BoardDescriptor};

/// Which side of the PS-PL boundary a peripheral sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Processing system, always reachable.
    Ps,
    /// Programmable logic, reachable only once the PS-PL bridges are enabled.
    Pl,
}

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub domain: Domain,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64) -> bool {
        addr.checked_sub(self.base).is_some_and(|offset| offset < self.size)
    }
}

#[derive(Debug, Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    pub block_rams: Vec<BlockRam>,
    pub fabric_enabled: bool,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the bus for a validated board descriptor.
    pub fn from_config(board: &BoardDescriptor, echo_uart: bool) -> anyhow::Result<Self> {
        let mut bus = Self::new();

        bus.peripherals.push(PeripheralEntry {
            name: "uart".to_string(),
            base: board.uart.base_address,
            size: uart::WINDOW_SIZE,
            domain: Domain::Ps,
            dev: Box::new(Uart16550::new(echo_uart)),
        });

        for cfg in &board.block_rams {
            let size = parse_size(&cfg.size)
                .with_context(|| format!("Block RAM '{}' has an invalid size", cfg.id))?;
            let block = BlockRam::new(cfg.id.clone(), size as usize);
            if !block.lock().load_words(&cfg.preload) {
                anyhow::bail!("Preload for block RAM '{}' does not fit", cfg.id);
            }
            bus.block_rams.push(block);
        }

        for ctrl in &board.bram_controllers {
            let block = bus
                .block_ram(&ctrl.block)
                .cloned()
                .with_context(|| format!("Unknown block RAM '{}' for '{}'", ctrl.block, ctrl.id))?;
            let size = block.size() as u64;
            tracing::debug!(
                "Mapping {} at {:#x}..{:#x} onto {}",
                ctrl.id,
                ctrl.base_address,
                ctrl.base_address + size,
                block.id
            );
            bus.peripherals.push(PeripheralEntry {
                name: ctrl.id.clone(),
                base: ctrl.base_address,
                size,
                domain: Domain::Pl,
                dev: Box::new(BramController::new(block)),
            });
        }

        Ok(bus)
    }

    pub fn block_ram(&self, id: &str) -> Option<&BlockRam> {
        self.block_rams.iter().find(|b| b.id == id)
    }

    pub fn find_peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    pub fn uart(&self) -> Option<&Uart16550> {
        self.peripherals
            .iter()
            .filter_map(|p| p.dev.as_any())
            .find_map(|dev| dev.downcast_ref::<Uart16550>())
    }

    fn route(&self, addr: u64) -> SimResult<usize> {
        let idx = self
            .peripherals
            .iter()
            .position(|p| p.contains(addr))
            .ok_or(SimulationError::MemoryViolation(addr))?;
        if self.peripherals[idx].domain == Domain::Pl && !self.fabric_enabled {
            return Err(SimulationError::FabricDisabled(addr));
        }
        Ok(idx)
    }

    /// Route a whole word; it must sit inside a single window.
    fn route_word(&self, addr: u64) -> SimResult<(usize, u64)> {
        let idx = self.route(addr)?;
        let p = &self.peripherals[idx];
        let offset = addr - p.base;
        if p.size - offset < 4 {
            // Report the first byte past the window
            return Err(SimulationError::MemoryViolation(
                addr.saturating_add(p.size - offset),
            ));
        }
        Ok((idx, offset))
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        let p = &self.peripherals[self.route(addr)?];
        p.dev.read(addr - p.base)
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        let idx = self.route(addr)?;
        let p = &mut self.peripherals[idx];
        p.dev.write(addr - p.base, value)
    }

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let (idx, offset) = self.route_word(addr)?;
        let dev = &self.peripherals[idx].dev;
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = dev.read(offset + i as u64)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        let (idx, offset) = self.route_word(addr)?;
        let dev = &mut self.peripherals[idx].dev;
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            dev.write(offset + i as u64, b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bus;

    fn default_bus() -> SystemBus {
        SystemBus::from_config(&BoardDescriptor::default(), false).unwrap()
    }

    #[test]
    fn test_default_map() {
        let bus = default_bus();
        let ctrl0 = bus.find_peripheral("axi_bram_ctrl_0").unwrap();
        assert_eq!(ctrl0.base, 0x4000_0000);
        assert_eq!(ctrl0.size, 8192);
        assert_eq!(ctrl0.domain, Domain::Pl);
        assert_eq!(bus.find_peripheral("uart").unwrap().domain, Domain::Ps);
        assert!(bus.uart().is_some());
    }

    #[test]
    fn test_fabric_gating() {
        let mut bus = default_bus();
        assert_eq!(
            bus.write_u32(0x4000_0000, 1),
            Err(SimulationError::FabricDisabled(0x4000_0000))
        );
        bus.fabric_enabled = true;
        bus.write_u32(0x4000_0000, 0xAABB_CCDD).unwrap();
        assert_eq!(bus.read_u32(0x4000_0000).unwrap(), 0xAABB_CCDD);
    }

    #[test]
    fn test_unmapped_address() {
        let mut bus = default_bus();
        bus.fabric_enabled = true;
        assert_eq!(
            bus.read_u32(0x1000_0000),
            Err(SimulationError::MemoryViolation(0x1000_0000))
        );
        // Straddling the end of a window faults on the first unmapped byte
        assert_eq!(
            bus.write_u32(0x4000_1FFE, 0),
            Err(SimulationError::MemoryViolation(0x4000_2000))
        );
    }

    #[test]
    fn test_straddling_word_leaves_memory_untouched() {
        let mut board = BoardDescriptor::default();
        board.block_rams[0].preload = vec![0; 2047];
        board.block_rams[0].preload.push(0x1111_1111);
        let mut bus = SystemBus::from_config(&board, false).unwrap();
        bus.fabric_enabled = true;

        assert_eq!(
            bus.write_u32(0x4000_1FFE, 0xAABB_CCDD),
            Err(SimulationError::MemoryViolation(0x4000_2000))
        );
        assert_eq!(bus.read_u32(0x4000_1FFC).unwrap(), 0x1111_1111);
        assert_eq!(
            bus.read_u32(0x4200_1FFD),
            Err(SimulationError::MemoryViolation(0x4200_2000))
        );
    }

    #[test]
    fn test_window_at_top_of_address_space() {
        let mut board = BoardDescriptor::default();
        board.bram_controllers[1].base_address = 0xFFFF_E000;
        let mut bus = SystemBus::from_config(&board, false).unwrap();
        bus.fabric_enabled = true;

        bus.write_u32(0xFFFF_FFFC, 0xAABB_CCDD).unwrap();
        assert_eq!(bus.read_u32(0x4000_1FFC).unwrap(), 0xAABB_CCDD);
        assert_eq!(
            bus.read_u32(0x1_0000_0000),
            Err(SimulationError::MemoryViolation(0x1_0000_0000))
        );
    }

    #[test]
    fn test_shared_block_through_both_controllers() {
        let mut bus = default_bus();
        bus.fabric_enabled = true;
        bus.write_u32(0x4000_0008, 0x1234_5678).unwrap();
        assert_eq!(bus.read_u32(0x4200_0008).unwrap(), 0x1234_5678);
        assert_eq!(bus.block_ram("bram0").unwrap().words()[2], 0x1234_5678);
    }

    #[test]
    fn test_preload() {
        let mut board = BoardDescriptor::default();
        board.block_rams[0].preload = vec![0xDEAD_BEEF, 0xCAFE_BABE];
        let mut bus = SystemBus::from_config(&board, false).unwrap();
        bus.fabric_enabled = true;
        assert_eq!(bus.read_u32(0x4200_0004).unwrap(), 0xCAFE_BABE);
    }

    #[test]
    fn test_uart_is_ps_side() {
        let mut bus = default_bus();
        bus.write_u8(0xE000_1000, b'A').unwrap();
        assert_eq!(bus.uart().unwrap().tx_string(), "A");
    }
}
