//! MIDI pause control: one configured control-change message drives the
//! pause gate.
//!
//! The midir connection callback does the bare minimum: parse the raw
//! bytes and forward control changes over a bounded channel. A small
//! poll thread drains pending events at a fixed interval and applies the
//! 0-63 resume / 64-127 pause threshold rule. Everything else on the wire
//! is discarded.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TryRecvError};
use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info};

use crate::gate::PauseGate;

/// Status nibble for control-change messages.
const CONTROL_CHANGE_STATUS: u8 = 0xB0;

/// CC values at or above this pause; below it they resume.
const PAUSE_THRESHOLD: u8 = 64;

/// Poll cadence for draining pending events.
const POLL_INTERVAL_MS: u64 = 5;

/// Pending-event queue depth; a full queue drops events, same lossy policy
/// as the audio ring.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Upper bound on events handled per poll so one burst cannot monopolize
/// the poll thread.
const MAX_EVENTS_PER_POLL: usize = 64;

/// Immutable pause-control binding: which channel and controller number the
/// bridge listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiControlBinding {
    channel: u8,
    controller: u8,
}

impl MidiControlBinding {
    pub fn new(channel: u8, controller: u8) -> Result<Self> {
        if channel > 15 {
            return Err(anyhow!("MIDI channel must be 0-15, got {channel}"));
        }
        if controller > 127 {
            return Err(anyhow!("MIDI controller must be 0-127, got {controller}"));
        }
        Ok(Self {
            channel,
            controller,
        })
    }

    fn matches(&self, event: ControlChange) -> bool {
        event.channel == self.channel && event.controller == self.controller
    }
}

/// One parsed control-change message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ControlChange {
    pub(crate) channel: u8,
    pub(crate) controller: u8,
    pub(crate) value: u8,
}

/// Extract a control change from raw MIDI bytes; anything else is `None`.
pub(crate) fn parse_control_change(raw: &[u8]) -> Option<ControlChange> {
    if raw.len() < 3 {
        return None;
    }
    let status = raw[0];
    if status & 0xF0 != CONTROL_CHANGE_STATUS {
        return None;
    }
    Some(ControlChange {
        channel: status & 0x0F,
        controller: raw[1] & 0x7F,
        value: raw[2] & 0x7F,
    })
}

/// Apply one event to the gate if it matches the binding. Returns whether
/// the event was consumed.
pub(crate) fn apply_control_change(
    binding: MidiControlBinding,
    gate: &PauseGate,
    event: ControlChange,
) -> bool {
    if !binding.matches(event) {
        return false;
    }
    let pause = event.value >= PAUSE_THRESHOLD;
    gate.set(pause);
    if pause {
        println!("pause via midi");
    } else {
        println!("unpause via midi");
    }
    info!(value = event.value, pause, "pause gate set via midi");
    true
}

/// List MIDI input port names.
pub fn list_devices() -> Result<Vec<String>> {
    let input = MidiInput::new("wavetap").map_err(|e| anyhow!("failed to init MIDI: {e}"))?;
    Ok(input
        .ports()
        .iter()
        .filter_map(|port| input.port_name(port).ok())
        .collect())
}

/// Open MIDI input plus the poll thread mapping the bound CC onto the gate.
pub struct MidiPauseBridge {
    connection: Option<MidiInputConnection<()>>,
    stop_tx: Option<Sender<()>>,
    poll: Option<JoinHandle<()>>,
}

impl MidiPauseBridge {
    /// Connect to the named input port. An unknown port name is a fatal
    /// setup fault, reported with the available names.
    pub fn connect(port_name: &str, binding: MidiControlBinding, gate: PauseGate) -> Result<Self> {
        let mut input = MidiInput::new("wavetap").map_err(|e| anyhow!("failed to init MIDI: {e}"))?;
        // Sysex/timing/active-sense never reach the parser.
        input.ignore(Ignore::All);
        let ports = input.ports();
        let port = ports
            .iter()
            .find(|port| {
                input
                    .port_name(port)
                    .map(|name| name == port_name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                let available = list_devices().unwrap_or_default();
                anyhow!(
                    "MIDI input '{port_name}' not found; available: {}",
                    available.join(", ")
                )
            })?;

        let (event_tx, event_rx) = bounded::<ControlChange>(EVENT_QUEUE_CAPACITY);
        let connection = input
            .connect(
                port,
                "wavetap-pause",
                move |_timestamp, raw, _| {
                    if let Some(event) = parse_control_change(raw) {
                        // Bounded, non-blocking; a full queue drops the event.
                        let _ = event_tx.try_send(event);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("failed to open MIDI input '{port_name}': {e}"))?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let poll = thread::Builder::new()
            .name("wavetap-midi".to_string())
            .spawn(move || poll_loop(event_rx, stop_rx, binding, gate))
            .context("failed to spawn MIDI poll thread")?;

        info!(port = port_name, "MIDI pause bridge connected");
        Ok(Self {
            connection: Some(connection),
            stop_tx: Some(stop_tx),
            poll: Some(poll),
        })
    }

    /// Tear the bridge down. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(poll) = self.poll.take() {
            let _ = poll.join();
        }
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Drop for MidiPauseBridge {
    fn drop(&mut self) {
        self.close();
    }
}

fn poll_loop(
    events: Receiver<ControlChange>,
    stop_rx: Receiver<()>,
    binding: MidiControlBinding,
    gate: PauseGate,
) {
    let ticker = tick(Duration::from_millis(POLL_INTERVAL_MS));
    loop {
        select! {
            recv(stop_rx) -> _ => return,
            recv(ticker) -> _ => {
                for _ in 0..MAX_EVENTS_PER_POLL {
                    match events.try_recv() {
                        Ok(event) => {
                            if !apply_control_change(binding, &gate, event) {
                                debug!(?event, "ignoring unbound control change");
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => return,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> MidiControlBinding {
        MidiControlBinding::new(0, 64).expect("valid binding")
    }

    #[test]
    fn parses_control_change_with_channel() {
        let event = parse_control_change(&[0xB3, 64, 127]).expect("control change");
        assert_eq!(
            event,
            ControlChange {
                channel: 3,
                controller: 64,
                value: 127
            }
        );
    }

    #[test]
    fn rejects_non_control_status_bytes() {
        assert!(parse_control_change(&[0x90, 60, 100]).is_none()); // note on
        assert!(parse_control_change(&[0x80, 60, 0]).is_none()); // note off
        assert!(parse_control_change(&[0xF8]).is_none()); // clock
        assert!(parse_control_change(&[0xB0, 64]).is_none()); // short read
    }

    #[test]
    fn value_zero_resumes_and_max_pauses() {
        let gate = PauseGate::new();
        gate.set(true);
        assert!(apply_control_change(
            binding(),
            &gate,
            ControlChange {
                channel: 0,
                controller: 64,
                value: 0
            }
        ));
        assert!(!gate.is_paused());
        assert!(apply_control_change(
            binding(),
            &gate,
            ControlChange {
                channel: 0,
                controller: 64,
                value: 127
            }
        ));
        assert!(gate.is_paused());
    }

    #[test]
    fn threshold_splits_at_sixty_four() {
        let gate = PauseGate::new();
        apply_control_change(
            binding(),
            &gate,
            ControlChange {
                channel: 0,
                controller: 64,
                value: 63,
            },
        );
        assert!(!gate.is_paused());
        apply_control_change(
            binding(),
            &gate,
            ControlChange {
                channel: 0,
                controller: 64,
                value: 64,
            },
        );
        assert!(gate.is_paused());
    }

    #[test]
    fn other_channel_or_controller_leaves_gate_unchanged() {
        let gate = PauseGate::new();
        assert!(!apply_control_change(
            binding(),
            &gate,
            ControlChange {
                channel: 1,
                controller: 64,
                value: 127
            }
        ));
        assert!(!apply_control_change(
            binding(),
            &gate,
            ControlChange {
                channel: 0,
                controller: 65,
                value: 127
            }
        ));
        assert!(!gate.is_paused());
    }

    #[test]
    fn binding_rejects_out_of_range_values() {
        assert!(MidiControlBinding::new(16, 0).is_err());
        assert!(MidiControlBinding::new(0, 128).is_err());
        assert!(MidiControlBinding::new(15, 127).is_ok());
    }
}
