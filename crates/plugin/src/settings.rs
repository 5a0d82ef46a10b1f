use pitch::yin::{validate_threshold, DEFAULT_THRESHOLD};
use pitch::DetectionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Result, EVENT_CHANNEL, METHOD_CHANNEL, VERSION_CHANNEL};

/// Plugin configuration. Every field has a default, so a settings file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginSettings {
    pub version_channel: String,
    pub method_channel: String,
    pub event_channel: String,
    /// Used for any value a `start` call leaves out or sets to 0.
    pub detection: DetectionConfig,
    /// YIN absolute threshold.
    pub threshold: f32,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            version_channel: VERSION_CHANNEL.to_string(),
            method_channel: METHOD_CHANNEL.to_string(),
            event_channel: EVENT_CHANNEL.to_string(),
            detection: DetectionConfig::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PluginSettings {
    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.detection.validate()?;
        validate_threshold(settings.threshold)?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let settings = Self::from_json(&raw)?;
        info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// `<config dir>/pitch-probe/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pitch-probe").join("settings.json"))
    }

    /// Load `explicit` if given; otherwise the default path if that file
    /// exists; otherwise built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("no settings file, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PluginError;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings =
            PluginSettings::from_json(r#"{"detection": {"bufferSize": 2048}, "threshold": 0.15}"#)
                .unwrap();
        assert_eq!(settings.detection.buffer_size, 2048);
        assert_eq!(settings.detection.sample_rate, 44_100);
        assert_eq!(settings.threshold, 0.15);
        assert_eq!(settings.method_channel, METHOD_CHANNEL);
    }

    #[test]
    fn invalid_detection_defaults_are_rejected() {
        let err = PluginSettings::from_json(r#"{"detection": {"bufferSize": 256, "overlap": 256}}"#)
            .unwrap_err();
        assert!(matches!(err, PluginError::Pitch(_)));
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        for raw in [r#"{"threshold": -0.2}"#, r#"{"threshold": 1.5}"#, r#"{"threshold": 0}"#] {
            let err = PluginSettings::from_json(raw).unwrap_err();
            assert!(
                matches!(err, PluginError::Pitch(pitch::PitchError::InvalidConfig(_))),
                "{raw} accepted"
            );
        }
    }

    #[test]
    fn load_reads_file_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"eventChannel": "custom/events"}"#).unwrap();

        let settings = PluginSettings::load_or_default(Some(&path)).unwrap();
        assert_eq!(settings.event_channel, "custom/events");

        let missing = dir.path().join("nope.json");
        assert!(matches!(
            PluginSettings::load(&missing),
            Err(PluginError::SettingsIo(_))
        ));
    }
}
