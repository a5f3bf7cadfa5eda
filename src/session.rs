//! Session glue: owns the capture pipeline and drives its lifecycle.
//!
//! State machine is Idle -> Recording -> Stopped, with Stopped terminal.
//! Startup order is ring allocation, stream open, file open, writer-thread
//! start; teardown is the reverse of the data path: stream first so the
//! producer goes quiet, then the writer's final drain, then the MIDI
//! bridge. Teardown is idempotent: every handle is taken exactly once.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use cpal::traits::StreamTrait;
use tracing::{info, warn};

use crate::audio::{ring, ring_capacity, CaptureStats, DiskWriter, Recorder, WavSink};
use crate::gate::PauseGate;
use crate::keys::{self, KeyCommand};
use crate::midi::{MidiControlBinding, MidiPauseBridge};
use crate::terminal::RawModeGuard;

/// Keyboard poll slice; the foreground loop sleeps in these increments and
/// accounts elapsed time once per whole second.
const KEY_POLL_INTERVAL_MS: u64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped,
}

/// MIDI side of the session configuration; absent means the bridge is
/// disabled entirely.
#[derive(Clone, Debug)]
pub struct MidiSettings {
    pub device: String,
    pub binding: MidiControlBinding,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub output: PathBuf,
    pub seconds: u64,
    pub device: Option<String>,
    pub channel_selectors: [usize; 2],
    pub midi: Option<MidiSettings>,
}

pub struct CaptureSession {
    config: SessionConfig,
    state: SessionState,
    gate: PauseGate,
    stats: CaptureStats,
    elapsed_secs: u64,
    stream: Option<cpal::Stream>,
    writer: Option<DiskWriter>,
    midi: Option<MidiPauseBridge>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            gate: PauseGate::new(),
            stats: CaptureStats::new(),
            elapsed_secs: 0,
            stream: None,
            writer: None,
            midi: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn gate(&self) -> &PauseGate {
        &self.gate
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Whole seconds of non-paused recording so far.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Bring the pipeline up. Any failure leaves the session in Idle with a
    /// fatal error; partially constructed pieces are released on drop.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            bail!("capture session already started");
        }

        if let Some(midi) = self.config.midi.clone() {
            self.midi = Some(MidiPauseBridge::connect(
                &midi.device,
                midi.binding,
                self.gate.clone(),
            )?);
        }

        let (producer, consumer) =
            ring::with_capacity(ring_capacity()).context("failed to allocate ring buffer")?;
        let recorder = Recorder::new(self.config.device.as_deref())?;
        let stream = recorder.open_stream(
            self.config.channel_selectors,
            self.gate.clone(),
            producer,
            self.stats.clone(),
        )?;
        let sink = WavSink::create(&self.config.output)?;
        let writer = DiskWriter::spawn(consumer, sink)?;
        stream.play().context("failed to start audio stream")?;

        self.stream = Some(stream);
        self.writer = Some(writer);
        self.state = SessionState::Recording;

        info!(
            device = %recorder.device_name(),
            output = %self.config.output.display(),
            seconds = self.config.seconds,
            "recording started"
        );
        println!(
            "Now recording to \"{}\" for {} seconds. Press 'p' to pause/unpause.",
            self.config.output.display(),
            self.config.seconds
        );
        Ok(())
    }

    /// Foreground timed loop: poll the keyboard in short slices, account a
    /// second of elapsed time per wall-clock second of non-paused capture,
    /// stop on target duration or Ctrl+C. Always tears down, and reports
    /// the first error from either the loop or the writer.
    pub fn run(&mut self) -> Result<()> {
        if self.state != SessionState::Recording {
            bail!("capture session is not recording");
        }
        // Without a TTY there is no keyboard; recording continues until the
        // target duration.
        let raw_mode = match RawModeGuard::new() {
            Ok(guard) => Some(guard),
            Err(err) => {
                warn!("keyboard polling disabled: {err}");
                None
            }
        };
        let loop_result = self.recording_loop(raw_mode.is_some());
        drop(raw_mode);
        let teardown_result = self.teardown();
        loop_result.and(teardown_result)
    }

    fn recording_loop(&mut self, keyboard: bool) -> Result<()> {
        let slice = Duration::from_millis(KEY_POLL_INTERVAL_MS);
        'recording: while self.elapsed_secs < self.config.seconds {
            // Key events can wake the poll early, so the second is bounded
            // by wall clock rather than a fixed poll count.
            let second_start = Instant::now();
            while second_start.elapsed() < Duration::from_secs(1) {
                if !keyboard {
                    std::thread::sleep(slice);
                    continue;
                }
                match keys::poll_command(slice)? {
                    Some(KeyCommand::TogglePause) => {
                        if self.gate.toggle() {
                            println!("pause pressed");
                            info!("pause gate set via keyboard");
                        } else {
                            println!("unpause pressed");
                            info!("pause gate cleared via keyboard");
                        }
                    }
                    Some(KeyCommand::Terminate) => {
                        println!("interrupted");
                        info!("termination requested via keyboard");
                        break 'recording;
                    }
                    None => {}
                }
            }
            self.tick_second();
            println!("rec time = {}", self.elapsed_secs);
        }
        Ok(())
    }

    /// One whole second of wall clock elapsed; paused seconds do not count.
    fn tick_second(&mut self) {
        if !self.gate.is_paused() {
            self.elapsed_secs += 1;
        }
    }

    /// Stop everything exactly once. Stream first (producer goes quiet),
    /// then the writer joins after its final drain, then the MIDI bridge.
    /// Calling this again is a no-op.
    pub fn teardown(&mut self) -> Result<()> {
        self.state = SessionState::Stopped;
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        let writer_result = match self.writer.take() {
            Some(mut writer) => writer.stop(),
            None => Ok(()),
        };
        if let Some(mut midi) = self.midi.take() {
            midi.close();
        }
        if writer_result.is_ok() {
            info!(
                frames = self.stats.frames_captured(),
                dropped = self.stats.samples_dropped(),
                "capture session stopped"
            );
        }
        writer_result
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}
