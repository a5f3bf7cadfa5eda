//! Shared pause flag read by the realtime capture callback.
//!
//! Two independent sources write the flag: the keyboard path toggles it,
//! the MIDI bridge sets it absolutely. Last write wins; the callback only
//! ever performs a single atomic load, so neither source can stall capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle over the process-wide pause flag.
///
/// `true` means capture writes are suppressed while the underlying audio
/// stream keeps running, so resuming pays no device re-open cost.
#[derive(Clone, Debug, Default)]
pub struct PauseGate {
    paused: Arc<AtomicBool>,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Level-triggered update used by the MIDI bridge.
    pub fn set(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Edge-triggered flip used by the keyboard path. Returns the new state.
    pub fn toggle(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unpaused() {
        assert!(!PauseGate::new().is_paused());
    }

    #[test]
    fn toggle_reports_new_state() {
        let gate = PauseGate::new();
        assert!(gate.toggle());
        assert!(gate.is_paused());
        assert!(!gate.toggle());
        assert!(!gate.is_paused());
    }

    #[test]
    fn double_toggle_restores_original_state() {
        let gate = PauseGate::new();
        gate.toggle();
        gate.toggle();
        assert!(!gate.is_paused());
    }

    #[test]
    fn set_overrides_toggled_state() {
        let gate = PauseGate::new();
        gate.toggle();
        gate.set(false);
        assert!(!gate.is_paused());
        gate.set(true);
        assert!(gate.is_paused());
    }

    #[test]
    fn clones_share_the_flag() {
        let gate = PauseGate::new();
        let other = gate.clone();
        gate.set(true);
        assert!(other.is_paused());
    }
}
