//! Realtime capture pipeline: device input, lock-free hand-off, disk drain.
//!
//! Data flows one way: cpal callback -> [`ring`] -> [`writer::DiskWriter`]
//! -> [`wav::WavSink`]. The callback side never blocks, allocates, or takes
//! a lock; the writer side owns all blocking file I/O.

pub mod recorder;
pub mod ring;
pub mod wav;
pub mod writer;

#[cfg(test)]
mod tests;

pub use recorder::{CaptureStats, Recorder};
pub use wav::WavSink;
pub use writer::DiskWriter;

/// Fixed capture sample rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// The output file is always stereo; the channel selectors pick which two
/// device channels feed it.
pub const NUM_CHANNELS: u16 = 2;

/// Hardware buffer period requested from the device.
pub const FRAMES_PER_BUFFER: u32 = 512;

/// The ring absorbs roughly this much audio before overrun drops samples.
const RING_BUFFER_SECONDS: f64 = 0.5;

/// Ring capacity in elements: ~500 ms of interleaved samples rounded up to
/// the next power of two (65_536 at the fixed rate and channel count).
pub fn ring_capacity() -> usize {
    ((SAMPLE_RATE as f64 * RING_BUFFER_SECONDS) as usize * NUM_CHANNELS as usize)
        .next_power_of_two()
}
