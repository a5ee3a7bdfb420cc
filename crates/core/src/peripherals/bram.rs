use crate::memory::BlockRam;
use crate::{Peripheral, SimResult, SimulationError};

/// AXI BRAM controller exposing one port of a block RAM.
#[derive(Debug)]
pub struct BramController {
    block: BlockRam,
}

impl BramController {
    pub fn new(block: BlockRam) -> Self {
        Self { block }
    }

    pub fn block(&self) -> &BlockRam {
        &self.block
    }
}

impl Peripheral for BramController {
    fn read(&self, offset: u64) -> SimResult<u8> {
        self.block
            .lock()
            .read_u8(offset)
            .ok_or(SimulationError::MemoryViolation(offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if self.block.lock().write_u8(offset, value) {
            Ok(())
        } else {
            Err(SimulationError::MemoryViolation(offset))
        }
    }
}
