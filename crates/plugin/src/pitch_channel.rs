//! `start` / `stop` control channel and the pitch event stream.

use channel::{EventSink, MethodCall, MethodCallHandler, MethodError, MethodResult, StreamHandler};
use pitch::{AudioEvent, AudioSource, DetectionConfig, PitchDetectionService, PitchHandler, PitchResult};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::logger::SessionLogger;
use crate::settings::PluginSettings;

/// Opens the audio source for a `start` call.
pub type SourceFactory =
    Arc<dyn Fn(&DetectionConfig) -> pitch::Result<Box<dyn AudioSource>> + Send + Sync>;

/// Live microphone input.
#[cfg(feature = "microphone")]
pub fn default_source_factory() -> SourceFactory {
    Arc::new(|_config: &DetectionConfig| -> pitch::Result<Box<dyn AudioSource>> {
        let source = pitch::microphone::MicrophoneSource::open()?;
        Ok(Box::new(source) as Box<dyn AudioSource>)
    })
}

/// Without the `microphone` feature there is nothing to capture from.
#[cfg(not(feature = "microphone"))]
pub fn default_source_factory() -> SourceFactory {
    Arc::new(|_config: &DetectionConfig| -> pitch::Result<Box<dyn AudioSource>> {
        Err(pitch::PitchError::NoInputDevice(
            "built without the `microphone` feature".to_string(),
        ))
    })
}

#[derive(Default)]
struct Detection {
    service: Option<PitchDetectionService>,
    session: Option<SessionLogger>,
}

/// Handles the control channel and the event channel.
pub struct PitchDetectionPlugin {
    settings: PluginSettings,
    source_factory: SourceFactory,
    detection: Mutex<Detection>,
    // Kept apart from `detection`: the dispatcher thread reads it while
    // `stop` joins that thread. Neither lock is held across a post or a join.
    sink: Arc<Mutex<Option<EventSink>>>,
}

impl PitchDetectionPlugin {
    pub fn new(settings: PluginSettings, source_factory: SourceFactory) -> Self {
        Self {
            settings,
            source_factory,
            detection: Mutex::new(Detection::default()),
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_detecting(&self) -> bool {
        self.lock_detection()
            .service
            .as_ref()
            .is_some_and(PitchDetectionService::is_running)
    }

    pub fn has_listener(&self) -> bool {
        lock(&self.sink).is_some()
    }

    /// Handle `start`: parse arguments, replace any running detection and
    /// begin a new one.
    pub fn start(&self, call: &MethodCall) -> MethodResult {
        let config = match self.requested_config(call) {
            Ok(config) => config,
            Err(err) => return MethodResult::Error(err),
        };

        Self::finish(self.take_detection());

        let session = SessionLogger::new(&config);
        let source = match (self.source_factory)(&config) {
            Ok(source) => source,
            Err(e) => {
                session.log_start_failed(&e.to_string());
                return MethodResult::error("START_FAILED", e.to_string());
            }
        };

        let service = PitchDetectionService::new(config, self.event_handler(session.clone()))
            .map(|service| service.with_threshold(self.settings.threshold));
        let mut service = match service {
            Ok(service) => service,
            Err(e) => return MethodResult::error("INVALID_ARGUMENT", e.to_string()),
        };
        if let Err(e) = service.start(source) {
            session.log_start_failed(&e.to_string());
            return MethodResult::error("START_FAILED", e.to_string());
        }

        let replaced = std::mem::replace(
            &mut *self.lock_detection(),
            Detection {
                service: Some(service),
                session: Some(session),
            },
        );
        Self::finish(replaced);
        MethodResult::done()
    }

    /// Handle `stop`. Succeeds whether or not detection was running.
    pub fn stop(&self) -> MethodResult {
        Self::finish(self.take_detection());
        MethodResult::done()
    }

    /// Drop the listener and stop detection.
    pub fn release(&self) {
        lock(&self.sink).take();
        self.stop();
    }

    fn requested_config(&self, call: &MethodCall) -> Result<DetectionConfig, MethodError> {
        let sample_rate = call.argument::<u32>("sampleRate")?;
        let buffer_size = call.argument::<usize>("bufferSize")?;
        let overlap = call.argument::<usize>("overlap")?;

        let config = DetectionConfig::from_requested_with(
            self.settings.detection,
            sample_rate,
            buffer_size,
            overlap,
        );
        config.validate().map_err(|e| {
            MethodError::new("INVALID_ARGUMENT", e.to_string()).with_details(call.arguments().clone())
        })?;
        Ok(config)
    }

    fn event_handler(&self, session: SessionLogger) -> PitchHandler {
        let sink = Arc::clone(&self.sink);
        Arc::new(move |result: PitchResult, event: &AudioEvent| {
            session.record(&result);
            // Posting runs the host listener, which may cancel the stream.
            let sink = lock(&sink).clone();
            if let Some(sink) = sink {
                sink.success(result);
            } else {
                debug!("no listener for pitch frame {}", event.frame_index);
            }
        })
    }

    fn take_detection(&self) -> Detection {
        std::mem::take(&mut *self.lock_detection())
    }

    /// Stop a detection already taken out of `detection`. Never called with
    /// the lock held, so a concurrent `stop` or a cancel from the dispatcher
    /// thread cannot block on it.
    fn finish(detection: Detection) {
        let Detection { service, session } = detection;
        let Some(mut service) = service else {
            return;
        };
        let summary = match service.stop() {
            Ok(summary) => summary,
            Err(e) => {
                warn!("pitch detection stopped with error: {}", e);
                None
            }
        };
        if let Some(session) = session {
            session.log_session_complete(summary.as_ref());
        }
    }

    fn lock_detection(&self) -> MutexGuard<'_, Detection> {
        lock(&self.detection)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MethodCallHandler for PitchDetectionPlugin {
    fn on_method_call(&self, call: &MethodCall) -> MethodResult {
        match call.method() {
            "start" => self.start(call),
            "stop" => self.stop(),
            _ => MethodResult::NotImplemented,
        }
    }
}

impl StreamHandler for PitchDetectionPlugin {
    fn on_listen(&self, _arguments: &Value, sink: EventSink) -> Result<(), MethodError> {
        info!("pitch event listener attached");
        *lock(&self.sink) = Some(sink);
        Ok(())
    }

    fn on_cancel(&self, _arguments: &Value) -> Result<(), MethodError> {
        info!("pitch event listener cancelled");
        self.release();
        Ok(())
    }
}

impl Drop for PitchDetectionPlugin {
    fn drop(&mut self) {
        self.stop();
    }
}
