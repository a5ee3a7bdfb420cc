//! Hardware capabilities the bring-up sequence is written against.
//!
//! None of these calls report failure: whatever goes wrong underneath is the
//! implementation's business, the sequence never sees it.

use core::fmt;
use core::ops::{Deref, DerefMut};

/// Platform lifecycle.
pub trait Platform {
    /// Prepare the console and hardware for use.
    fn init(&mut self);
    /// Secondary configuration after `init`, e.g. enabling the PS-PL bridges.
    fn post_config(&mut self);
    /// Release what `init` set up.
    fn cleanup(&mut self);
}

/// Formatted console output.
pub trait Console {
    fn write_str(&mut self, s: &str);

    fn print(&mut self, args: fmt::Arguments<'_>) {
        struct Adapter<'a, C: ?Sized>(&'a mut C);

        impl<C: Console + ?Sized> fmt::Write for Adapter<'_, C> {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                self.0.write_str(s);
                Ok(())
            }
        }

        let _ = fmt::Write::write_fmt(&mut Adapter(self), args);
    }
}

/// Print to a [`Console`] with `format!` syntax.
#[macro_export]
macro_rules! console_print {
    ($console:expr, $($arg:tt)*) => {{
        use $crate::platform::Console as _;
        $console.print(format_args!($($arg)*))
    }};
}

/// 32-bit memory-mapped I/O. Every call is one access, issued in program order.
pub trait Mmio {
    fn write32(&mut self, addr: u32, value: u32);
    fn read32(&mut self, addr: u32) -> u32;
}

/// Platform resources held for the lifetime of the guard.
///
/// `acquire` runs [`Platform::init`]; dropping the guard runs
/// [`Platform::cleanup`] exactly once, also during unwinding.
pub struct PlatformGuard<'a, P: Platform + ?Sized> {
    platform: &'a mut P,
}

impl<'a, P: Platform + ?Sized> PlatformGuard<'a, P> {
    pub fn acquire(platform: &'a mut P) -> Self {
        platform.init();
        Self { platform }
    }
}

impl<P: Platform + ?Sized> Deref for PlatformGuard<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.platform
    }
}

impl<P: Platform + ?Sized> DerefMut for PlatformGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.platform
    }
}

impl<P: Platform + ?Sized> Drop for PlatformGuard<'_, P> {
    fn drop(&mut self) {
        self.platform.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lifecycle {
        calls: Vec<&'static str>,
        out: String,
    }

    impl Platform for Lifecycle {
        fn init(&mut self) {
            self.calls.push("init");
        }
        fn post_config(&mut self) {
            self.calls.push("post_config");
        }
        fn cleanup(&mut self) {
            self.calls.push("cleanup");
        }
    }

    impl Console for Lifecycle {
        fn write_str(&mut self, s: &str) {
            self.out.push_str(s);
        }
    }

    #[test]
    fn test_guard_brackets_usage() {
        let mut platform = Lifecycle::default();
        {
            let mut guard = PlatformGuard::acquire(&mut platform);
            guard.post_config();
            assert_eq!(guard.calls, vec!["init", "post_config"]);
        }
        assert_eq!(platform.calls, vec!["init", "post_config", "cleanup"]);
    }

    #[test]
    fn test_guard_releases_on_unwind() {
        let mut platform = Lifecycle::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = PlatformGuard::acquire(&mut platform);
            panic!("bus exploded");
        }));
        assert!(result.is_err());
        assert_eq!(platform.calls, vec!["init", "cleanup"]);
    }

    #[test]
    fn test_console_print_hex() {
        let mut platform = Lifecycle::default();
        console_print!(platform, "values at address {:x} is {:x}", 0x4200_0004u32, 0xAu32);
        assert_eq!(platform.out, "values at address 42000004 is a");
    }
}
