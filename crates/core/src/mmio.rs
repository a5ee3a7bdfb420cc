use crate::platform::Mmio;
use core::ptr;

/// [`Mmio`] over a real device address space.
///
/// Physical address `phys_base + n` is accessed at `window + n`. Every access is a
/// volatile load or store, so none is merged, elided or reordered by the compiler.
/// Accesses outside the window are dropped (writes) or read as zero.
#[derive(Debug)]
pub struct VolatileMmio {
    window: *mut u8,
    phys_base: u32,
    len: usize,
}

impl VolatileMmio {
    /// # Safety
    ///
    /// `window` must be valid for volatile 32-bit reads and writes over `len`
    /// bytes for the lifetime of the returned value, and must be 4-byte aligned.
    pub unsafe fn new(window: *mut u8, phys_base: u32, len: usize) -> Self {
        Self {
            window,
            phys_base,
            len,
        }
    }

    fn word_ptr(&self, addr: u32) -> Option<*mut u32> {
        let offset = addr
            .checked_sub(self.phys_base)
            .map(|o| o as usize)
            .filter(|o| o % 4 == 0 && o.checked_add(4).is_some_and(|end| end <= self.len));
        let Some(offset) = offset else {
            tracing::warn!("MMIO access at {:#x} outside mapped window", addr);
            return None;
        };
        // SAFETY: offset + 4 <= len, inside the window promised by `new`.
        Some(unsafe { self.window.add(offset) } as *mut u32)
    }
}

impl Mmio for VolatileMmio {
    fn write32(&mut self, addr: u32, value: u32) {
        if let Some(p) = self.word_ptr(addr) {
            // SAFETY: aligned and in bounds, see `word_ptr`.
            unsafe { ptr::write_volatile(p, value) };
        }
    }

    fn read32(&mut self, addr: u32) -> u32 {
        match self.word_ptr(addr) {
            // SAFETY: aligned and in bounds, see `word_ptr`.
            Some(p) => unsafe { ptr::read_volatile(p) },
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_volatile_window() {
        let mut backing = [0u32; 4];
        let mut mmio =
            unsafe { VolatileMmio::new(backing.as_mut_ptr() as *mut u8, 0x4000_0000, 16) };

        mmio.write32(0x4000_0004, 0xAABB_CCDE);
        assert_eq!(mmio.read32(0x4000_0004), 0xAABB_CCDE);

        // Outside the window: dropped and read as zero
        mmio.write32(0x4000_0010, 1);
        mmio.write32(0x3FFF_FFFC, 1);
        assert_eq!(mmio.read32(0x3FFF_FFFC), 0);
        assert_eq!(mmio.read32(0x4000_0010), 0);
        assert_eq!(mmio.read32(0x4000_0002), 0);

        drop(mmio);
        assert_eq!(backing, [0, 0xAABB_CCDE, 0, 0]);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_every_miss_is_logged() {
        let mut backing = [0u32; 4];
        let mut mmio =
            unsafe { VolatileMmio::new(backing.as_mut_ptr() as *mut u8, 0x4000_0000, 16) };

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            mmio.read32(0x3FFF_FFFC);
            mmio.write32(0x4000_0010, 1);
            mmio.read32(0x4000_0002);
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("MMIO access at 0x3ffffffc outside mapped window"));
        assert!(logs.contains("MMIO access at 0x40000010 outside mapped window"));
        assert!(logs.contains("MMIO access at 0x40000002 outside mapped window"));
    }
}
