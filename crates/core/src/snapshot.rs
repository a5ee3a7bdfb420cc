use crate::board::SimBoard;
use crate::observer::Access;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug)]
pub struct BoardSnapshot {
    pub board: String,
    pub fabric_enabled: bool,
    pub uart: UartSnapshot,
    pub block_rams: BTreeMap<String, Vec<u32>>,
    pub faults: Vec<String>,
    #[serde(default)]
    pub accesses: Vec<Access>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UartSnapshot {
    pub divisor: u16,
    pub baud_rate: Option<u32>,
    pub fifo_enabled: bool,
    pub tx: String,
}

impl BoardSnapshot {
    pub fn capture(board: &SimBoard, accesses: Vec<Access>) -> Self {
        let clock_hz = board.uart_config().clock_hz;
        let uart = match board.bus.uart() {
            Some(u) => UartSnapshot {
                divisor: u.divisor(),
                baud_rate: u.baud_rate(clock_hz),
                fifo_enabled: u.fifo_enabled(),
                tx: u.tx_string(),
            },
            None => UartSnapshot {
                divisor: 0,
                baud_rate: None,
                fifo_enabled: false,
                tx: String::new(),
            },
        };

        Self {
            board: board.name.clone(),
            fabric_enabled: board.bus.fabric_enabled,
            uart,
            block_rams: board
                .bus
                .block_rams
                .iter()
                .map(|b| (b.id.clone(), b.words()))
                .collect(),
            faults: board.faults().iter().map(|f| f.to_string()).collect(),
            accesses,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
