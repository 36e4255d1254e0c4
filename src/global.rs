//! Process-wide console access and print macros.
//!
//! The console driver assumes a single guest execution context. When more
//! than one context wants to print, install the console here once during
//! startup; every [`print_console!`] / [`println_console!`] call then runs
//! inside a critical section, which provides the external synchronization
//! the register protocol itself does not.
//!
//! The platform must supply a `critical-section` implementation (on a
//! single-core bare-metal target, the usual interrupt-masking one). Output
//! produced before the console is installed is silently dropped and
//! counted; [`dropped_message_count`] exposes the counter for diagnostics.

use core::cell::RefCell;
use core::fmt::{self, Write as _};
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;

use crate::console::{Console, ConsoleWriter};

static CONSOLE: Mutex<RefCell<Option<Console<'static>>>> = Mutex::new(RefCell::new(None));

/// Messages dropped because no console was installed yet.
static DROPPED_MESSAGES: AtomicU32 = AtomicU32::new(0);

/// Install the process-wide console.
///
/// Call once during system initialization, before any context prints.
///
/// # Panics
/// Panics if a console was already installed.
pub fn install(console: Console<'static>) {
    critical_section::with(|cs| {
        let mut slot = CONSOLE.borrow_ref_mut(cs);
        if slot.is_some() {
            panic!("global console installed more than once");
        }
        *slot = Some(console);
    });
}

/// Whether [`install`] has run.
pub fn is_installed() -> bool {
    critical_section::with(|cs| CONSOLE.borrow_ref(cs).is_some())
}

/// Drain available receive bytes into `buf` through the shared console.
///
/// Returns 0 when no console is installed or no data is pending.
pub fn read(buf: &mut [u8]) -> usize {
    critical_section::with(|cs| {
        CONSOLE
            .borrow_ref_mut(cs)
            .as_mut()
            .map(|console| console.read(buf))
            .unwrap_or(0)
    })
}

/// Transmit `buf` through the shared console.
///
/// Returns the byte count handed to the channel; 0 (and a bump of the
/// dropped counter) when no console is installed.
pub fn write(buf: &[u8]) -> usize {
    critical_section::with(|cs| match CONSOLE.borrow_ref_mut(cs).as_mut() {
        Some(console) => console.write(buf),
        None => {
            DROPPED_MESSAGES.fetch_add(1, Ordering::Relaxed);
            0
        }
    })
}

/// Format and transmit one message. Used by the print macros.
#[doc(hidden)]
pub fn write_fmt(args: fmt::Arguments<'_>) {
    critical_section::with(|cs| match CONSOLE.borrow_ref_mut(cs).as_mut() {
        Some(console) => {
            let mut writer = ConsoleWriter::new(console);
            let _ = writer.write_fmt(args);
            // Drop flushes the tail chunk.
        }
        None => {
            DROPPED_MESSAGES.fetch_add(1, Ordering::Relaxed);
        }
    });
}

/// Number of messages dropped before the console was installed.
pub fn dropped_message_count() -> u32 {
    DROPPED_MESSAGES.load(Ordering::Relaxed)
}

/// Print to the shared console without a trailing newline.
#[macro_export]
macro_rules! print_console {
    ($($arg:tt)*) => {
        $crate::global::write_fmt(core::format_args!($($arg)*))
    };
}

/// Print to the shared console with a trailing newline.
#[macro_export]
macro_rules! println_console {
    () => {
        $crate::global::write_fmt(core::format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::global::write_fmt(core::format_args!(
            "{}\n",
            core::format_args!($($arg)*)
        ))
    };
}
