//! WAV output via `hound`.
//!
//! Each chunk append re-opens the file and seeks to the end of the data
//! chunk, so the file on disk is a valid container after every flush.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use super::{NUM_CHANNELS, SAMPLE_RATE};

/// Fixed output encoding: captured f32 samples are stored as 16-bit PCM.
const BITS_PER_SAMPLE: u16 = 16;

pub struct WavSink {
    path: PathBuf,
}

impl WavSink {
    /// Create (or truncate) the output file with an empty, valid WAV header.
    pub fn create(path: &Path) -> Result<Self> {
        let spec = WavSpec {
            channels: NUM_CHANNELS,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };
        WavWriter::create(path, spec)
            .with_context(|| format!("failed to create output file {}", path.display()))?
            .finalize()
            .with_context(|| format!("failed to write WAV header to {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Append interleaved f32 samples to the end of the data chunk.
    pub fn append(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut writer = WavWriter::append(&self.path)
            .with_context(|| format!("failed to reopen {} for append", self.path.display()))?;
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(pcm)
                .with_context(|| format!("failed to write to {}", self.path.display()))?;
        }
        writer
            .finalize()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
