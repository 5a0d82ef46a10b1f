//! Live capture from the default (or `PITCH_INPUT_DEVICE`-selected) input.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{info, warn};

use crate::source::{AudioSource, Fill};
use crate::{PitchError, Result};

pub const INPUT_DEVICE_ENV: &str = "PITCH_INPUT_DEVICE";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// cpal streams are not Send on every backend. The stream is built on the
// thread that handles `start`, then moves with the source to the dispatcher
// thread, which drops it. Nothing calls into it after construction; it is
// only held to keep capture alive.
struct CaptureStream(#[allow(dead_code)] Stream);

unsafe impl Send for CaptureStream {}

/// Microphone input, downmixed to mono.
pub struct MicrophoneSource {
    _stream: CaptureStream,
    receiver: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
    sample_rate: u32,
}

impl MicrophoneSource {
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host)?;
        let config = device
            .default_input_config()
            .map_err(|e| PitchError::SourceError(format!("failed to get input config: {e}")))?;
        info!(
            "input format sample_rate={} channels={} sample_format={:?}",
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );

        let sample_rate = config.sample_rate().0;
        let (sender, receiver) = mpsc::channel();
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_input_stream::<f32>(&device, &config.into(), sender)?,
            cpal::SampleFormat::I16 => build_input_stream::<i16>(&device, &config.into(), sender)?,
            cpal::SampleFormat::U16 => build_input_stream::<u16>(&device, &config.into(), sender)?,
            other => {
                return Err(PitchError::SourceError(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        };
        stream
            .play()
            .map_err(|e| PitchError::SourceError(format!("failed to play stream: {e}")))?;

        Ok(Self {
            _stream: CaptureStream(stream),
            receiver,
            pending: VecDeque::new(),
            sample_rate,
        })
    }
}

impl AudioSource for MicrophoneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<Fill> {
        if self.pending.is_empty() {
            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(Fill::Samples(0)),
                Err(RecvTimeoutError::Disconnected) => return Ok(Fill::Exhausted),
            }
        }
        while let Ok(chunk) = self.receiver.try_recv() {
            self.pending.extend(chunk);
        }

        let n = buf.len().min(self.pending.len());
        for (slot, sample) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = sample;
        }
        Ok(Fill::Samples(n))
    }
}

fn select_input_device(host: &Host) -> Result<Device> {
    if let Ok(requested) = std::env::var(INPUT_DEVICE_ENV) {
        let needle = requested.trim().to_lowercase();
        if !needle.is_empty() {
            let devices = host
                .input_devices()
                .map_err(|e| PitchError::NoInputDevice(format!("failed to enumerate: {e}")))?;
            for device in devices {
                let name = device
                    .name()
                    .unwrap_or_else(|_| "<unknown input device>".to_string());
                if name.to_lowercase().contains(&needle) {
                    info!("selected input device by env override: {}", name);
                    return Ok(device);
                }
            }
            return Err(PitchError::NoInputDevice(format!(
                "no input device matching {INPUT_DEVICE_ENV}='{requested}'"
            )));
        }
    }

    let device = host
        .default_input_device()
        .ok_or_else(|| PitchError::NoInputDevice("no default input device".to_string()))?;
    let name = device
        .name()
        .unwrap_or_else(|_| "<unknown input device>".to_string());
    info!("selected default input device: {}", name);
    Ok(device)
}

fn build_input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sender: Sender<Vec<f32>>,
) -> Result<Stream>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let err_fn = |err| warn!("error in audio stream: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono: Vec<f32> = data
                    .chunks(channels)
                    .map(|frame| {
                        frame
                            .iter()
                            .map(|&s| <f32 as cpal::Sample>::from_sample(s))
                            .sum::<f32>()
                            / frame.len() as f32
                    })
                    .collect();
                // The receiver is gone once detection stops.
                let _ = sender.send(mono);
            },
            err_fn,
            None,
        )
        .map_err(|e| PitchError::SourceError(format!("failed to build input stream: {e}")))
}
