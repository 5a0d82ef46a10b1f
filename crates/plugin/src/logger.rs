//! Logging setup and per-session detection logging.

use chrono::{DateTime, Local};
use pitch::{DetectionConfig, DispatchSummary, PitchResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{PluginError, Result};

/// Env var holding the log filter, e.g. `PITCH_PLUGIN_LOG=debug`.
pub const LOG_ENV: &str = "PITCH_PLUGIN_LOG";

/// Install a stderr subscriber filtered by [`LOG_ENV`], or `default_filter`
/// when the variable is unset.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| PluginError::Logging(e.to_string()))
}

/// Tracks one `start`..`stop` detection session.
#[derive(Clone)]
pub struct SessionLogger {
    session_id: String,
    start_time: DateTime<Local>,
    events: Arc<AtomicU64>,
    pitched: Arc<AtomicU64>,
}

impl SessionLogger {
    pub fn new(config: &DetectionConfig) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        info!(
            "[{}] pitch session started: {} Hz, buffer {}, overlap {}",
            session_id, config.sample_rate, config.buffer_size, config.overlap
        );

        Self {
            session_id,
            start_time: Local::now(),
            events: Arc::new(AtomicU64::new(0)),
            pitched: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self, result: &PitchResult) {
        self.events.fetch_add(1, Ordering::Relaxed);
        if result.is_pitched {
            self.pitched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn event_count(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn pitched_count(&self) -> u64 {
        self.pitched.load(Ordering::Relaxed)
    }

    pub fn log_start_failed(&self, reason: &str) {
        error!("[{}] pitch session failed to start: {}", self.session_id, reason);
    }

    pub fn log_session_complete(&self, summary: Option<&DispatchSummary>) {
        let elapsed = Local::now().signed_duration_since(self.start_time);
        info!(
            "[{}] pitch session completed in {:.2}s | frames: {} | events: {} | pitched: {}",
            self.session_id,
            elapsed.num_milliseconds() as f32 / 1000.0,
            summary.map_or(0, |s| s.frames),
            self.event_count(),
            self.pitched_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_events_across_clones() {
        let logger = SessionLogger::new(&DetectionConfig::default());
        let clone = logger.clone();
        clone.record(&PitchResult::unpitched());
        clone.record(&PitchResult {
            pitch: 440.0,
            probability: 0.95,
            is_pitched: true,
        });

        assert_eq!(logger.event_count(), 2);
        assert_eq!(logger.pitched_count(), 1);
        assert_eq!(logger.session_id(), clone.session_id());
        logger.log_session_complete(None);
    }

    #[test]
    fn session_ids_are_unique() {
        let config = DetectionConfig::default();
        assert_ne!(
            SessionLogger::new(&config).session_id(),
            SessionLogger::new(&config).session_id()
        );
    }
}
