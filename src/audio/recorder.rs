//! Input device selection and the realtime capture callback.
//!
//! Device handling follows the same shape as the rest of the CPAL pipeline:
//! enumerate by display name, fall back to the system default, and convert
//! every supported sample format to f32 up front so downstream code stays
//! format-agnostic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use tracing::{debug, warn};

use super::ring::RingProducer;
use super::{FRAMES_PER_BUFFER, NUM_CHANNELS, SAMPLE_RATE};
use crate::gate::PauseGate;

/// Upper bound on frames accepted from a single callback invocation; larger
/// blocks are truncated (and counted as dropped) so the scratch buffer never
/// reallocates on the realtime thread.
const MAX_CALLBACK_FRAMES: usize = 4_096;

/// Shared observability counters for the capture path.
///
/// The callback is the sole writer; everything else reads. Dropped samples
/// are the defined overrun behavior, surfaced here instead of as an error.
#[derive(Clone, Debug, Default)]
pub struct CaptureStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    frames_captured: AtomicU64,
    samples_dropped: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic count of whole frames committed to the ring.
    pub fn frames_captured(&self) -> u64 {
        self.inner.frames_captured.load(Ordering::Relaxed)
    }

    /// Elements lost to ring overrun or oversized callback blocks.
    pub fn samples_dropped(&self) -> u64 {
        self.inner.samples_dropped.load(Ordering::Relaxed)
    }

    fn record(&self, frames: u64, dropped: u64) {
        self.inner.frames_captured.fetch_add(frames, Ordering::Relaxed);
        if dropped > 0 {
            self.inner.samples_dropped.fetch_add(dropped, Ordering::Relaxed);
        }
    }
}

/// State moved into the realtime callback: gate, ring producer, counters,
/// and a preallocated scratch buffer for channel selection.
pub(super) struct CaptureTap {
    gate: PauseGate,
    producer: RingProducer,
    stats: CaptureStats,
    selectors: [usize; 2],
    input_channels: usize,
    scratch: Vec<f32>,
}

impl CaptureTap {
    pub(super) fn new(
        gate: PauseGate,
        producer: RingProducer,
        stats: CaptureStats,
        selectors: [usize; 2],
        input_channels: usize,
    ) -> Self {
        Self {
            gate,
            producer,
            stats,
            selectors,
            input_channels: input_channels.max(1),
            scratch: Vec::with_capacity(MAX_CALLBACK_FRAMES * NUM_CHANNELS as usize),
        }
    }

    /// One callback invocation: pick the two selected channels out of each
    /// interleaved input frame and hand the slice to the ring.
    ///
    /// Paused means no side effects at all; the stream keeps running so
    /// resuming costs nothing. Runs in bounded time regardless of disk
    /// speed: the only shared-state operations are one atomic gate load and
    /// the lock-free ring write.
    pub(super) fn write_block<T, F>(&mut self, data: &[T], convert: F)
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        if self.gate.is_paused() {
            return;
        }
        self.scratch.clear();
        let mut truncated = 0u64;
        for frame in data.chunks_exact(self.input_channels) {
            if self.scratch.len() + NUM_CHANNELS as usize > self.scratch.capacity() {
                truncated += NUM_CHANNELS as u64;
                continue;
            }
            self.scratch.push(convert(frame[self.selectors[0]]));
            self.scratch.push(convert(frame[self.selectors[1]]));
        }
        let written = self.producer.try_write(&self.scratch);
        let overrun = (self.scratch.len() - written) as u64;
        self.stats.record(
            (written / NUM_CHANNELS as usize) as u64,
            overrun + truncated,
        );
    }
}

/// Audio input device wrapper around CPAL.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// List input device names so the CLI can expose a selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Create a recorder for the named device, or the system default when no
    /// name is given. An unknown name is a fatal setup fault; the error
    /// carries the available names so the operator can correct the argument.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| {
                        let available = Self::list_devices().unwrap_or_default();
                        anyhow!(
                            "input device '{name}' not found; available: {}",
                            available.join(", ")
                        )
                    })?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self { device })
    }

    /// Name of the active device.
    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Open the input stream at the fixed rate and buffer period, with the
    /// realtime callback feeding the ring producer. The stream is returned
    /// stopped; call `play()` once the writer thread is up.
    pub fn open_stream(
        &self,
        selectors: [usize; 2],
        gate: PauseGate,
        producer: RingProducer,
        stats: CaptureStats,
    ) -> Result<cpal::Stream> {
        let default_config = self
            .device
            .default_input_config()
            .context("failed to query input config")?;
        let format = default_config.sample_format();
        // Request just enough interleaved channels to cover both selectors.
        let input_channels = selectors
            .iter()
            .max()
            .map(|&s| s + 1)
            .unwrap_or(NUM_CHANNELS as usize)
            .max(NUM_CHANNELS as usize);
        let config = StreamConfig {
            channels: input_channels as u16,
            sample_rate: SampleRate(SAMPLE_RATE),
            buffer_size: BufferSize::Fixed(FRAMES_PER_BUFFER),
        };
        debug!(
            device = %self.device_name(),
            ?format,
            channels = input_channels,
            "opening input stream"
        );

        let mut tap = CaptureTap::new(gate, producer, stats, selectors, input_channels);
        let err_fn = |err| warn!("audio stream error: {err}");

        let stream = match format {
            SampleFormat::F32 => self.device.build_input_stream(
                &config,
                move |data: &[f32], _| tap.write_block(data, |sample| sample),
                err_fn,
                None,
            ),
            SampleFormat::I16 => self.device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    tap.write_block(data, |sample| sample as f32 / 32_768.0_f32)
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => self.device.build_input_stream(
                &config,
                move |data: &[u16], _| {
                    tap.write_block(data, |sample| (sample as f32 - 32_768.0_f32) / 32_768.0_f32)
                },
                err_fn,
                None,
            ),
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };
        stream.with_context(|| format!("failed to open stream on '{}'", self.device_name()))
    }
}
