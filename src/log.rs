//! # Serial Logging
//!
//! Leveled log lines on COM1 (`0x3F8`), one `[LEVEL] message` per line.
//!
//! ```ignore
//! log_info!("IDT loaded: {} gates", 256);
//! log_debug!("irq: keyboard scancode {:#x}", sc);
//! ```
//!
//! The port sits behind a `spin::Mutex`; it is always taken with interrupts
//! disabled so an IRQ handler that logs cannot spin on a lock held by the
//! code it interrupted. Host builds discard every line.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            _ => Level::Debug,
        }
    }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

#[cfg(target_os = "none")]
pub static SERIAL: spin::Mutex<uart_16550::SerialPort> =
    spin::Mutex::new(unsafe { uart_16550::SerialPort::new(0x3F8) });

/// Set the verbosity and bring up the UART.
pub fn init(level: Level) {
    set_max_level(level);
    #[cfg(target_os = "none")]
    x86_64::instructions::interrupts::without_interrupts(|| SERIAL.lock().init());
}

pub fn set_max_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn max_level() -> Level {
    Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: Level) -> bool {
    level <= max_level()
}

#[doc(hidden)]
pub fn write(level: Level, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    #[cfg(target_os = "none")]
    {
        use core::fmt::Write;
        x86_64::instructions::interrupts::without_interrupts(|| {
            let mut serial = SERIAL.lock();
            let _ = writeln!(serial, "[{}] {}", level.label(), args);
        });
    }
    #[cfg(not(target_os = "none"))]
    let _ = args;
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::log::write($crate::log::Level::Error, format_args!($($arg)*)) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::log::write($crate::log::Level::Warn, format_args!($($arg)*)) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::log::write($crate::log::Level::Info, format_args!($($arg)*)) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::log::write($crate::log::Level::Debug, format_args!($($arg)*)) };
}
