//! Audio sources feeding the dispatcher. All sources deliver mono f32
//! samples in [-1, 1].

use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::{PitchError, Result};

/// Outcome of a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many samples were written to the front of the buffer. Zero is
    /// allowed for live sources with nothing buffered yet.
    Samples(usize),
    /// The source has no more audio.
    Exhausted,
}

/// Producer of mono audio.
///
/// `read` must not block indefinitely: live sources should return
/// `Fill::Samples(0)` after a short poll so the dispatcher can observe stop
/// requests.
pub trait AudioSource: Send {
    fn sample_rate(&self) -> u32;

    fn read(&mut self, buf: &mut [f32]) -> Result<Fill>;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<Fill> {
        (**self).read(buf)
    }
}

/// Samples held in memory.
#[derive(Debug, Clone)]
pub struct VecSource {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
}

impl VecSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl AudioSource for VecSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<Fill> {
        if self.remaining() == 0 {
            return Ok(Fill::Exhausted);
        }
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        Ok(Fill::Samples(n))
    }
}

/// Streams a WAV file, downmixing every frame to mono.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    channels: usize,
    sample_rate: u32,
    sample_format: SampleFormat,
    scale: f32,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(PitchError::SourceError(format!(
                "{} declares zero channels",
                path.display()
            )));
        }
        if spec.sample_format == SampleFormat::Int && !(8..=32).contains(&spec.bits_per_sample) {
            return Err(PitchError::SourceError(format!(
                "unsupported bit depth {} in {}",
                spec.bits_per_sample,
                path.display()
            )));
        }

        debug!(
            "opened {} ({} Hz, {} channels, {:?} {}-bit)",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.sample_format,
            spec.bits_per_sample
        );

        Ok(Self {
            reader,
            channels: spec.channels as usize,
            sample_rate: spec.sample_rate,
            sample_format: spec.sample_format,
            scale: 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    fn next_raw(&mut self) -> Option<Result<f32>> {
        match self.sample_format {
            SampleFormat::Float => self
                .reader
                .samples::<f32>()
                .next()
                .map(|s| s.map_err(PitchError::from)),
            SampleFormat::Int => {
                let scale = self.scale;
                self.reader
                    .samples::<i32>()
                    .next()
                    .map(|s| s.map(|v| v as f32 * scale).map_err(PitchError::from))
            }
        }
    }
}

impl AudioSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<Fill> {
        let mut written = 0;
        'frames: while written < buf.len() {
            let mut sum = 0.0f32;
            for _ in 0..self.channels {
                match self.next_raw() {
                    Some(sample) => sum += sample?,
                    // A truncated trailing frame is dropped.
                    None => break 'frames,
                }
            }
            buf[written] = sum / self.channels as f32;
            written += 1;
        }

        if written == 0 && !buf.is_empty() {
            Ok(Fill::Exhausted)
        } else {
            Ok(Fill::Samples(written))
        }
    }
}
