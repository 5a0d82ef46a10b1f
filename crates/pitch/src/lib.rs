//! Pitch detection layer
//! Frames audio from a source, runs a YIN estimator per frame and reports
//! the detected fundamental frequency.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod dispatcher;
#[cfg(feature = "microphone")]
pub mod microphone;
pub mod service;
pub mod source;
pub mod yin;

pub use dispatcher::{AudioDispatcher, AudioEvent, AudioProcessor, DispatchSummary, DispatcherHandle};
pub use service::{PitchDetectionService, PitchHandler, PitchProcessor};
pub use source::{AudioSource, Fill, VecSource, WavSource};
pub use yin::Yin;

/// Pitch-specific errors
#[derive(Debug, Error)]
pub enum PitchError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio source error: {0}")]
    SourceError(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("No input device available: {0}")]
    NoInputDevice(String),

    #[error("Dispatcher thread failed: {0}")]
    DispatcherFailed(String),
}

pub type Result<T> = std::result::Result<T, PitchError>;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_OVERLAP: usize = 0;

/// One pitch estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchResult {
    /// Hz, or -1 when the frame is unpitched.
    pub pitch: f32,
    pub probability: f32,
    #[serde(rename = "isPitched")]
    pub is_pitched: bool,
}

impl PitchResult {
    pub fn unpitched() -> Self {
        Self {
            pitch: -1.0,
            probability: 0.0,
            is_pitched: false,
        }
    }
}

/// Framing parameters for a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionConfig {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub overlap: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl DetectionConfig {
    /// Build a config where `0` (or absent) means "use the default".
    pub fn from_requested(
        sample_rate: Option<u32>,
        buffer_size: Option<usize>,
        overlap: Option<usize>,
    ) -> Self {
        Self::from_requested_with(Self::default(), sample_rate, buffer_size, overlap)
    }

    /// Like [`DetectionConfig::from_requested`] with custom defaults.
    pub fn from_requested_with(
        defaults: Self,
        sample_rate: Option<u32>,
        buffer_size: Option<usize>,
        overlap: Option<usize>,
    ) -> Self {
        Self {
            sample_rate: sample_rate.filter(|&v| v != 0).unwrap_or(defaults.sample_rate),
            buffer_size: buffer_size.filter(|&v| v != 0).unwrap_or(defaults.buffer_size),
            overlap: overlap.filter(|&v| v != 0).unwrap_or(defaults.overlap),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PitchError::InvalidConfig("sample rate must be positive".into()));
        }
        if self.buffer_size < 2 {
            return Err(PitchError::InvalidConfig(format!(
                "buffer size must be at least 2, got {}",
                self.buffer_size
            )));
        }
        if self.overlap >= self.buffer_size {
            return Err(PitchError::InvalidConfig(format!(
                "overlap ({}) must be smaller than buffer size ({})",
                self.overlap, self.buffer_size
            )));
        }
        Ok(())
    }

    /// Samples between the starts of consecutive frames.
    pub fn step(&self) -> usize {
        self.buffer_size - self.overlap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_missing_means_default() {
        let config = DetectionConfig::from_requested(Some(0), None, Some(0));
        assert_eq!(config, DetectionConfig::default());

        let config = DetectionConfig::from_requested(Some(48_000), Some(2048), Some(512));
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.step(), 1536);
    }

    #[test]
    fn validate_rejects_bad_framing() {
        let mut config = DetectionConfig::default();
        assert!(config.validate().is_ok());

        config.overlap = config.buffer_size;
        assert!(matches!(config.validate(), Err(PitchError::InvalidConfig(_))));

        config.buffer_size = 1;
        config.overlap = 0;
        assert!(config.validate().is_err());
    }
}
