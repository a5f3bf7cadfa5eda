//! Raw-mode RAII guard so the terminal is restored on drop and on panic.

use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

static RAW_MODE_ENABLED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Enables raw mode for the lifetime of the guard. A shared panic hook
/// restores the terminal even if the foreground loop panics mid-recording.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn new() -> std::io::Result<Self> {
        install_terminal_panic_hook();
        enable_raw_mode()?;
        RAW_MODE_ENABLED.store(true, Ordering::SeqCst);
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    if RAW_MODE_ENABLED.swap(false, Ordering::SeqCst) {
        let _ = disable_raw_mode();
    }
}

fn install_terminal_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));
    });
}
