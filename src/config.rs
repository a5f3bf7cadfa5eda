//! Command-line parsing and validation.
//!
//! Arguments are positional: output file, duration, audio device, two
//! channel selectors, then the optional MIDI triple. Omitting the MIDI
//! device name disables MIDI pause control entirely.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::midi::MidiControlBinding;
use crate::session::{MidiSettings, SessionConfig};

const DEFAULT_OUTPUT: &str = "testrecording.wav";
const DEFAULT_RECORD_SECONDS: u64 = 60;
const DEFAULT_MIDI_CONTROLLER: u8 = 64;

#[derive(Clone, Debug, Parser)]
#[command(
    name = "wavetap",
    about = "Record an input device to a WAV file, with keyboard and MIDI pause control",
    version
)]
pub struct Args {
    /// Output WAV path
    #[arg(default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Recording duration in seconds of non-paused capture
    #[arg(default_value_t = DEFAULT_RECORD_SECONDS)]
    pub seconds: u64,

    /// Audio input device name (exact match; defaults to the system device)
    pub device: Option<String>,

    /// Device channel feeding the left side of the stereo file
    #[arg(default_value_t = 0)]
    pub left_channel: usize,

    /// Device channel feeding the right side of the stereo file
    #[arg(default_value_t = 1)]
    pub right_channel: usize,

    /// MIDI input port name; omit to disable MIDI pause control
    pub midi_device: Option<String>,

    /// MIDI channel the pause controller sends on (0-15)
    #[arg(default_value_t = 0)]
    pub midi_channel: u8,

    /// MIDI controller number mapped to pause/resume (0-127)
    #[arg(default_value_t = DEFAULT_MIDI_CONTROLLER)]
    pub midi_controller: u8,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print detected MIDI input ports and exit
    #[arg(long = "list-midi-devices", default_value_t = false)]
    pub list_midi_devices: bool,

    /// Write diagnostic traces to the temp-dir log file
    #[arg(long, env = "WAVETAP_LOGS", default_value_t = false)]
    pub logs: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.seconds == 0 {
            bail!("duration must be at least 1 second");
        }
        if self.left_channel == self.right_channel {
            bail!("channel selectors must name two different device channels");
        }
        if self.midi_channel > 15 {
            bail!("MIDI channel must be 0-15, got {}", self.midi_channel);
        }
        if self.midi_controller > 127 {
            bail!(
                "MIDI controller must be 0-127, got {}",
                self.midi_controller
            );
        }
        Ok(())
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        let midi = match &self.midi_device {
            Some(device) => Some(MidiSettings {
                device: device.clone(),
                binding: MidiControlBinding::new(self.midi_channel, self.midi_controller)?,
            }),
            None => None,
        };
        Ok(SessionConfig {
            output: self.output.clone(),
            seconds: self.seconds,
            device: self.device.clone(),
            channel_selectors: [self.left_channel, self.right_channel],
            midi,
        })
    }
}
