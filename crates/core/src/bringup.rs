//! BRAM bring-up: greet on the console, fill one BRAM controller's window with a
//! known pattern, then dump the first words seen through a second controller.

use crate::console_print;
use crate::platform::{Console, Mmio, Platform, PlatformGuard};
use anyhow::Context;
use zynqwired_config::{BoardDescriptor, BRINGUP_WORDS};

pub const WORD_COUNT: u32 = BRINGUP_WORDS as u32;
pub const WRITE_PATTERN: u32 = 0xAABB_CCDD;
pub const GREETING: &str = "Hello World\n\r";
pub const STATUS: &str = "Successfully ran Hello World application";
pub const EXIT_SUCCESS: i32 = 0;

/// Base addresses of the two regions the sequence touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringupConfig {
    /// Region A, written.
    pub write_base: u32,
    /// Region B, read back and reported.
    pub read_base: u32,
}

impl BringupConfig {
    pub fn from_board(board: &BoardDescriptor) -> anyhow::Result<Self> {
        let base_of = |id: &str| -> anyhow::Result<u32> {
            let ctrl = board
                .controller(id)
                .with_context(|| format!("Unknown BRAM controller '{}'", id))?;
            u32::try_from(ctrl.base_address).with_context(|| {
                format!(
                    "Base address {:#x} of '{}' is outside the 32-bit address space",
                    ctrl.base_address, id
                )
            })
        };
        Ok(Self {
            write_base: base_of(&board.bringup.write_controller)?,
            read_base: base_of(&board.bringup.read_controller)?,
        })
    }
}

/// Value written to word `i` of Region A.
pub fn pattern_word(i: u32) -> u32 {
    i.wrapping_add(WRITE_PATTERN)
}

/// Run the bring-up sequence once. Always returns [`EXIT_SUCCESS`].
pub fn run<B>(board: &mut B, config: &BringupConfig) -> i32
where
    B: Platform + Console + Mmio + ?Sized,
{
    let mut board = PlatformGuard::acquire(board);
    board.post_config();

    board.write_str(GREETING);
    board.write_str(STATUS);

    for i in 0..WORD_COUNT {
        board.write32(config.write_base.wrapping_add(4 * i), pattern_word(i));
    }

    for i in 0..WORD_COUNT {
        let addr = config.read_base.wrapping_add(4 * i);
        let value = board.read32(addr);
        console_print!(board, "values at address {:x} is {:x}", addr, value);
    }

    drop(board);
    tracing::info!("Bring-up sequence finished");
    EXIT_SUCCESS
}
