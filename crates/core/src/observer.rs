use crate::SimulationError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Trait for observing 32-bit MMIO traffic on the board.
pub trait BusObserver: std::fmt::Debug + Send + Sync {
    fn on_write32(&self, _addr: u32, _value: u32) {}
    fn on_read32(&self, _addr: u32, _value: u32) {}
    fn on_fault(&self, _error: &SimulationError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Access {
    Write { addr: u32, value: u32 },
    Read { addr: u32, value: u32 },
}

impl Access {
    pub fn addr(&self) -> u32 {
        match *self {
            Access::Write { addr, .. } | Access::Read { addr, .. } => addr,
        }
    }
}

/// Records every access in program order.
#[derive(Debug, Default)]
pub struct AccessLog {
    entries: Mutex<Vec<Access>>,
}

impl AccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Access> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.entries()
            .into_iter()
            .filter_map(|a| match a {
                Access::Write { addr, value } => Some((addr, value)),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<(u32, u32)> {
        self.entries()
            .into_iter()
            .filter_map(|a| match a {
                Access::Read { addr, value } => Some((addr, value)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, access: Access) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(access);
        }
    }
}

impl BusObserver for AccessLog {
    fn on_write32(&self, addr: u32, value: u32) {
        self.push(Access::Write { addr, value });
    }

    fn on_read32(&self, addr: u32, value: u32) {
        self.push(Access::Read { addr, value });
    }
}

#[derive(Debug, Default)]
pub struct AccessCounters {
    writes: AtomicU64,
    reads: AtomicU64,
    faults: AtomicU64,
}

impl AccessCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.writes.store(0, Ordering::SeqCst);
        self.reads.store(0, Ordering::SeqCst);
        self.faults.store(0, Ordering::SeqCst);
    }

    pub fn get_writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get_reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn get_faults(&self) -> u64 {
        self.faults.load(Ordering::SeqCst)
    }
}

impl BusObserver for AccessCounters {
    fn on_write32(&self, _addr: u32, _value: u32) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_read32(&self, _addr: u32, _value: u32) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn on_fault(&self, _error: &SimulationError) {
        self.faults.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_log_order() {
        let log = AccessLog::new();
        log.on_write32(0x4000_0000, 1);
        log.on_read32(0x4200_0000, 2);
        log.on_write32(0x4000_0004, 3);

        assert_eq!(
            log.entries(),
            vec![
                Access::Write { addr: 0x4000_0000, value: 1 },
                Access::Read { addr: 0x4200_0000, value: 2 },
                Access::Write { addr: 0x4000_0004, value: 3 },
            ]
        );
        assert_eq!(log.writes(), vec![(0x4000_0000, 1), (0x4000_0004, 3)]);
        assert_eq!(log.reads(), vec![(0x4200_0000, 2)]);
        assert_eq!(log.entries()[1].addr(), 0x4200_0000);
    }

    #[test]
    fn test_counters() {
        let counters = AccessCounters::new();
        counters.on_write32(0, 0);
        counters.on_read32(0, 0);
        counters.on_read32(4, 0);
        counters.on_fault(&SimulationError::MemoryViolation(0x10));
        assert_eq!(counters.get_writes(), 1);
        assert_eq!(counters.get_reads(), 2);
        assert_eq!(counters.get_faults(), 1);

        counters.reset();
        assert_eq!(counters.get_reads(), 0);
    }
}
