use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The bring-up sequence touches this many words in each region.
pub const BRINGUP_WORDS: u64 = 10;

/// Every mapped window must end at or below this address.
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Size of the 16550 register window.
pub const UART_WINDOW_SIZE: u64 = 0x20;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartConfig {
    pub base_address: u64,
    #[serde(default = "default_uart_clock")]
    pub clock_hz: u32,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl UartConfig {
    /// Divisor latch value for the configured baud rate, rounded to nearest.
    /// None when the rate cannot be reached with a non-zero 16-bit divisor.
    pub fn divisor(&self) -> Option<u16> {
        if self.baud_rate == 0 {
            return None;
        }
        let denom = 16 * self.baud_rate as u64;
        match u16::try_from((self.clock_hz as u64 + denom / 2) / denom) {
            Ok(0) | Err(_) => None,
            Ok(d) => Some(d),
        }
    }
}

fn default_uart_clock() -> u32 {
    100_000_000
}

fn default_baud_rate() -> u32 {
    9600
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BlockRamConfig {
    pub id: String,
    pub size: String, // e.g. "8KiB"
    #[serde(default)]
    pub preload: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BramControllerConfig {
    pub id: String,
    pub base_address: u64,
    pub block: String, // Reference to a block RAM id
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BringupSection {
    pub write_controller: String,
    pub read_controller: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoardDescriptor {
    pub name: String,
    pub uart: UartConfig,
    pub block_rams: Vec<BlockRamConfig>,
    pub bram_controllers: Vec<BramControllerConfig>,
    pub bringup: BringupSection,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Controller '{controller}' references unknown block RAM '{block}'")]
    UnknownBlock { controller: String, block: String },
    #[error("Bring-up references unknown controller '{0}'")]
    UnknownController(String),
    #[error("Duplicate id '{0}'")]
    DuplicateId(String),
    #[error("Base address {addr:#x} of '{id}' is not 32-bit aligned")]
    Misaligned { id: String, addr: u64 },
    #[error("Block RAM '{id}' is {size} bytes, at least {min} required")]
    TooSmall { id: String, size: u64, min: u64 },
    #[error("Block RAM '{id}' preload of {words} words does not fit in {size} bytes")]
    PreloadOverflow { id: String, words: usize, size: u64 },
    #[error("Regions '{0}' and '{1}' overlap")]
    Overlap(String, String),
    #[error("Region '{id}' at {base:#x} does not fit in the 32-bit address space")]
    OutOfRange { id: String, base: u64 },
    #[error("UART baud rate must be at most clock_hz / 16 and need a divisor below 65536")]
    InvalidBaudRate,
}

impl Default for BoardDescriptor {
    /// ZC702-style board: PS UART1 and two AXI BRAM controllers on both
    /// ports of a single 8 KiB block RAM.
    fn default() -> Self {
        Self {
            name: "zc702-bram".to_string(),
            uart: UartConfig {
                base_address: 0xE000_1000,
                clock_hz: default_uart_clock(),
                baud_rate: default_baud_rate(),
            },
            block_rams: vec![BlockRamConfig {
                id: "bram0".to_string(),
                size: "8KiB".to_string(),
                preload: Vec::new(),
            }],
            bram_controllers: vec![
                BramControllerConfig {
                    id: "axi_bram_ctrl_0".to_string(),
                    base_address: 0x4000_0000,
                    block: "bram0".to_string(),
                },
                BramControllerConfig {
                    id: "axi_bram_ctrl_1".to_string(),
                    base_address: 0x4200_0000,
                    block: "bram0".to_string(),
                },
            ],
            bringup: BringupSection {
                write_controller: "axi_bram_ctrl_0".to_string(),
                read_controller: "axi_bram_ctrl_1".to_string(),
            },
        }
    }
}

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open board descriptor at {:?}", path.as_ref()))?;
        let board: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Descriptor YAML")?;
        board.validate()?;
        Ok(board)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let board: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Board Descriptor YAML")?;
        board.validate()?;
        Ok(board)
    }

    pub fn block(&self, id: &str) -> Option<&BlockRamConfig> {
        self.block_rams.iter().find(|b| b.id == id)
    }

    pub fn controller(&self, id: &str) -> Option<&BramControllerConfig> {
        self.bram_controllers.iter().find(|c| c.id == id)
    }

    /// Size in bytes of the window a controller maps, i.e. the size of its block.
    pub fn controller_size(&self, ctrl: &BramControllerConfig) -> Result<u64> {
        let block = self.block(&ctrl.block).ok_or_else(|| DescriptorError::UnknownBlock {
            controller: ctrl.id.clone(),
            block: ctrl.block.clone(),
        })?;
        parse_size(&block.size)
    }

    pub fn validate(&self) -> Result<()> {
        let uart = &self.uart;
        if uart.baud_rate > uart.clock_hz / 16 || uart.divisor().is_none() {
            anyhow::bail!(DescriptorError::InvalidBaudRate);
        }

        let mut ids = HashSet::new();
        for id in self
            .block_rams
            .iter()
            .map(|b| &b.id)
            .chain(self.bram_controllers.iter().map(|c| &c.id))
        {
            if !ids.insert(id.as_str()) {
                anyhow::bail!(DescriptorError::DuplicateId(id.clone()));
            }
        }

        let min = BRINGUP_WORDS * 4;
        for block in &self.block_rams {
            let size = parse_size(&block.size)
                .with_context(|| format!("Block RAM '{}' has an invalid size", block.id))?;
            if size < min {
                anyhow::bail!(DescriptorError::TooSmall {
                    id: block.id.clone(),
                    size,
                    min,
                });
            }
            if block.preload.len() as u64 * 4 > size {
                anyhow::bail!(DescriptorError::PreloadOverflow {
                    id: block.id.clone(),
                    words: block.preload.len(),
                    size,
                });
            }
        }

        // (id, start, end) of every mapped window, UART included
        let mut windows = vec![window("uart", uart.base_address, UART_WINDOW_SIZE)?];
        for ctrl in &self.bram_controllers {
            if ctrl.base_address % 4 != 0 {
                anyhow::bail!(DescriptorError::Misaligned {
                    id: ctrl.id.clone(),
                    addr: ctrl.base_address,
                });
            }
            let size = self.controller_size(ctrl)?;
            windows.push(window(&ctrl.id, ctrl.base_address, size)?);
        }
        for (i, a) in windows.iter().enumerate() {
            for b in &windows[i + 1..] {
                if a.1 < b.2 && b.1 < a.2 {
                    anyhow::bail!(DescriptorError::Overlap(a.0.clone(), b.0.clone()));
                }
            }
        }

        for id in [&self.bringup.write_controller, &self.bringup.read_controller] {
            if self.controller(id).is_none() {
                anyhow::bail!(DescriptorError::UnknownController(id.clone()));
            }
        }

        Ok(())
    }
}

/// `(id, start, end)` of a mapped window, rejected if it leaves the 32-bit space.
fn window(id: &str, base: u64, size: u64) -> Result<(String, u64, u64)> {
    match base.checked_add(size) {
        Some(end) if end <= ADDRESS_SPACE_END => Ok((id.to_string(), base, end)),
        _ => anyhow::bail!(DescriptorError::OutOfRange {
            id: id.to_string(),
            base,
        }),
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
