use std::sync::Arc;
use tracing::{info, warn};

use crate::dispatcher::{AudioDispatcher, AudioEvent, AudioProcessor, DispatchSummary, DispatcherHandle};
use crate::source::AudioSource;
use crate::yin::{Yin, DEFAULT_THRESHOLD};
use crate::{DetectionConfig, PitchResult, Result};

/// Callback receiving every pitch estimate.
pub type PitchHandler = Arc<dyn Fn(PitchResult, &AudioEvent) + Send + Sync>;

/// Runs YIN on each frame and reports the result.
pub struct PitchProcessor {
    yin: Yin,
    handler: PitchHandler,
}

impl PitchProcessor {
    pub fn new(yin: Yin, handler: PitchHandler) -> Self {
        Self { yin, handler }
    }
}

impl AudioProcessor for PitchProcessor {
    fn process(&mut self, frame: &[f32], event: &AudioEvent) {
        let result = self.yin.get_pitch(frame);
        (self.handler)(result, event);
    }
}

/// Start/stop wrapper around a dispatcher thread running a [`PitchProcessor`].
pub struct PitchDetectionService {
    config: DetectionConfig,
    threshold: f32,
    handler: PitchHandler,
    running: Option<DispatcherHandle>,
}

impl PitchDetectionService {
    pub fn new(config: DetectionConfig, handler: PitchHandler) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            threshold: DEFAULT_THRESHOLD,
            handler,
            running: None,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Begin detecting on `source`. A detection already in progress is
    /// stopped first.
    pub fn start<S: AudioSource + 'static>(&mut self, source: S) -> Result<()> {
        if self.running.is_some() {
            info!("restarting pitch detection");
            self.stop()?;
        }

        let sample_rate = source.sample_rate();
        if sample_rate != self.config.sample_rate {
            warn!(
                "source delivers {} Hz, requested {} Hz; detecting at the source rate",
                sample_rate, self.config.sample_rate
            );
        }

        let yin = Yin::with_threshold(sample_rate, self.config.buffer_size, self.threshold);
        let mut dispatcher = AudioDispatcher::new(source, self.config)?;
        dispatcher.add_processor(PitchProcessor::new(yin, Arc::clone(&self.handler)));
        self.running = Some(dispatcher.spawn()?);

        info!(
            "pitch detection started (sample_rate={}, buffer_size={}, overlap={})",
            sample_rate, self.config.buffer_size, self.config.overlap
        );
        Ok(())
    }

    /// Stop detection. Returns `None` when nothing was running.
    pub fn stop(&mut self) -> Result<Option<DispatchSummary>> {
        let Some(handle) = self.running.take() else {
            return Ok(None);
        };
        let summary = handle.stop()?;
        info!("pitch detection stopped after {} frames", summary.frames);
        Ok(Some(summary))
    }

    /// Block until the source runs dry. Returns `None` when nothing was running.
    pub fn wait(&mut self) -> Result<Option<DispatchSummary>> {
        let Some(handle) = self.running.take() else {
            return Ok(None);
        };
        handle.wait().map(Some)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PitchDetectionService {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("pitch detection did not stop cleanly: {}", e);
        }
    }
}
