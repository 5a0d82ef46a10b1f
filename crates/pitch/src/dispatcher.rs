//! Frames audio from a source and hands each frame to a set of processors.
//!
//! Consecutive frames start `buffer_size - overlap` samples apart. When the
//! source runs dry, the last partial frame is zero-padded and processed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

use crate::source::{AudioSource, Fill};
use crate::{DetectionConfig, PitchError, Result};

const THREAD_NAME: &str = "Audio Dispatcher";

/// Metadata for the frame being processed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioEvent {
    /// Seconds from the start of the stream to the first sample of the frame.
    pub timestamp: f64,
    pub frame_index: u64,
    pub rms: f32,
    pub sample_rate: u32,
}

/// Consumer of framed audio. Runs on the dispatcher thread.
pub trait AudioProcessor: Send {
    fn process(&mut self, frame: &[f32], event: &AudioEvent);

    /// Called once after the last frame.
    fn finished(&mut self) {}
}

/// What a dispatcher run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub frames: u64,
    pub samples: u64,
    pub stopped_early: bool,
}

pub struct AudioDispatcher<S> {
    source: S,
    config: DetectionConfig,
    processors: Vec<Box<dyn AudioProcessor>>,
    stop: Arc<AtomicBool>,
}

impl<S: AudioSource> AudioDispatcher<S> {
    pub fn new(source: S, config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            processors: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn add_processor(&mut self, processor: impl AudioProcessor + 'static) {
        self.processors.push(Box::new(processor));
    }

    /// Flag that ends the run before the next read once set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run on the current thread until the source is exhausted or stopped.
    pub fn run(mut self) -> Result<DispatchSummary> {
        let size = self.config.buffer_size;
        let overlap = self.config.overlap;
        let step = self.config.step();
        let sample_rate = self.source.sample_rate();

        let mut frame = vec![0.0f32; size];
        let mut filled = 0usize;
        let mut frame_start = 0u64;
        let mut summary = DispatchSummary::default();

        loop {
            if self.stop.load(Ordering::SeqCst) {
                summary.stopped_early = true;
                break;
            }

            match self.source.read(&mut frame[filled..])? {
                Fill::Samples(n) => {
                    filled += n;
                    summary.samples += n as u64;
                }
                Fill::Exhausted => {
                    let carried = if summary.frames == 0 { 0 } else { overlap };
                    if filled > carried {
                        frame[filled..].fill(0.0);
                        self.emit(&frame, summary.frames, frame_start, sample_rate);
                        summary.frames += 1;
                    }
                    break;
                }
            }

            if filled == size {
                self.emit(&frame, summary.frames, frame_start, sample_rate);
                summary.frames += 1;
                frame.copy_within(step.., 0);
                filled = overlap;
                frame_start += step as u64;
            }
        }

        for processor in &mut self.processors {
            processor.finished();
        }
        debug!(
            "dispatcher finished: {} frames, {} samples, stopped_early={}",
            summary.frames, summary.samples, summary.stopped_early
        );
        Ok(summary)
    }

    fn emit(&mut self, frame: &[f32], frame_index: u64, frame_start: u64, sample_rate: u32) {
        let event = AudioEvent {
            timestamp: frame_start as f64 / sample_rate.max(1) as f64,
            frame_index,
            rms: calculate_rms(frame),
            sample_rate,
        };
        for processor in &mut self.processors {
            processor.process(frame, &event);
        }
    }
}

impl<S: AudioSource + 'static> AudioDispatcher<S> {
    /// Run on a dedicated thread.
    pub fn spawn(self) -> Result<DispatcherHandle> {
        let stop = self.stop_flag();
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let result = self.run();
                if let Err(e) = &result {
                    error!("audio dispatcher failed: {}", e);
                }
                result
            })
            .map_err(|e| PitchError::DispatcherFailed(format!("failed to spawn thread: {e}")))?;

        info!("audio dispatcher started");
        Ok(DispatcherHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Owner of a running dispatcher thread. Dropping it stops the thread.
pub struct DispatcherHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<DispatchSummary>>>,
}

impl DispatcherHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Ask the thread to stop and wait for it.
    ///
    /// Called from a processor on the dispatcher thread itself, this only
    /// raises the stop flag: the run ends after the current frame and the
    /// returned summary is empty apart from `stopped_early`.
    pub fn stop(mut self) -> Result<DispatchSummary> {
        self.stop.store(true, Ordering::SeqCst);
        self.join()
    }

    /// Wait for the source to run dry without requesting a stop.
    pub fn wait(mut self) -> Result<DispatchSummary> {
        self.join()
    }

    fn join(&mut self) -> Result<DispatchSummary> {
        let Some(thread) = self.thread.take() else {
            return Ok(DispatchSummary::default());
        };
        if thread.thread().id() == thread::current().id() {
            debug!("dispatcher stopped from its own thread; detaching");
            return Ok(DispatchSummary {
                stopped_early: self.stop.load(Ordering::SeqCst),
                ..DispatchSummary::default()
            });
        }
        thread
            .join()
            .map_err(|_| PitchError::DispatcherFailed("dispatcher thread panicked".into()))?
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop.store(true, Ordering::SeqCst);
            let _ = self.join();
        }
    }
}

pub(crate) fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|&s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}
