//! Pitch detection plugin.
//!
//! Registers three channels on a host [`BinaryMessenger`]:
//! - `flutter_pitch_detection`: answers `getPlatformVersion`,
//! - `pitch_detection`: `start` / `stop` detection,
//! - `pitch_detection/events`: streams pitch estimates to the host.
//!
//! [`BinaryMessenger`]: channel::BinaryMessenger

use thiserror::Error;

pub mod host;
pub mod logger;
pub mod pitch_channel;
pub mod platform_version;
pub mod registrar;
pub mod settings;

pub use pitch_channel::{default_source_factory, PitchDetectionPlugin, SourceFactory};
pub use platform_version::{PlatformVersionResponder, GET_PLATFORM_VERSION};
pub use registrar::{PluginBinding, PluginBuilder};
pub use settings::PluginSettings;

pub const VERSION_CHANNEL: &str = "flutter_pitch_detection";
pub const METHOD_CHANNEL: &str = "pitch_detection";
pub const EVENT_CHANNEL: &str = "pitch_detection/events";

/// Plugin-level errors
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Settings file error: {0}")]
    SettingsIo(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),

    #[error("Pitch error: {0}")]
    Pitch(#[from] pitch::PitchError),

    #[error("Channel error: {0}")]
    Channel(#[from] channel::ChannelError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, PluginError>;
