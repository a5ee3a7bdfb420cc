use std::sync::{Arc, Mutex, MutexGuard};

/// A simple flat memory storage, addressed by offset from its start.
#[derive(Debug)]
pub struct LinearMemory {
    pub data: Vec<u8>,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read_u8(&self, offset: u64) -> Option<u8> {
        self.data.get(offset as usize).copied()
    }

    pub fn write_u8(&mut self, offset: u64, value: u8) -> bool {
        match self.data.get_mut(offset as usize) {
            Some(byte) => {
                *byte = value;
                true
            }
            None => false,
        }
    }

    /// Store little-endian words starting at offset 0. Returns false if they do not fit.
    pub fn load_words(&mut self, words: &[u32]) -> bool {
        if words.len() * 4 > self.data.len() {
            return false;
        }
        for (chunk, word) in self.data.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        true
    }

    pub fn words(&self) -> Vec<u32> {
        self.data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Block RAM shared between the controllers wired to its ports.
#[derive(Debug, Clone)]
pub struct BlockRam {
    pub id: String,
    storage: Arc<Mutex<LinearMemory>>,
}

impl BlockRam {
    pub fn new(id: impl Into<String>, size: usize) -> Self {
        Self {
            id: id.into(),
            storage: Arc::new(Mutex::new(LinearMemory::new(size))),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, LinearMemory> {
        // Poisoning leaves the bytes intact.
        self.storage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn words(&self) -> Vec<u32> {
        self.lock().words()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_memory_bounds() {
        let mut mem = LinearMemory::new(4);
        assert!(mem.write_u8(3, 0xAB));
        assert_eq!(mem.read_u8(3), Some(0xAB));
        assert!(!mem.write_u8(4, 0x01));
        assert_eq!(mem.read_u8(4), None);
    }

    #[test]
    fn test_load_words_little_endian() {
        let mut mem = LinearMemory::new(8);
        assert!(mem.load_words(&[0xAABB_CCDD]));
        assert_eq!(&mem.data[..4], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(mem.words(), vec![0xAABB_CCDD, 0]);
        assert!(!mem.load_words(&[1, 2, 3]));
    }

    #[test]
    fn test_block_ram_ports_share_storage() {
        let port_a = BlockRam::new("bram0", 16);
        let port_b = port_a.clone();
        port_a.lock().write_u8(0, 0x5A);
        assert_eq!(port_b.lock().read_u8(0), Some(0x5A));
        assert_eq!(port_b.size(), 16);
    }
}
