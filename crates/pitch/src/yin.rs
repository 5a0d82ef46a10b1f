//! YIN fundamental frequency estimator (de Cheveigné & Kawahara, 2002).

use crate::{PitchError, PitchResult, Result};

pub const DEFAULT_THRESHOLD: f32 = 0.20;

/// The absolute threshold must lie strictly between 0 and 1. At or past
/// either end every frame comes out unpitched, or every frame pitched.
pub fn validate_threshold(threshold: f32) -> Result<()> {
    if threshold > 0.0 && threshold < 1.0 {
        Ok(())
    } else {
        Err(PitchError::InvalidConfig(format!(
            "threshold must be in (0, 1), got {threshold}"
        )))
    }
}

/// Reusable YIN estimator for frames of a fixed size.
#[derive(Debug, Clone)]
pub struct Yin {
    sample_rate: f32,
    threshold: f32,
    buffer: Vec<f32>,
}

impl Yin {
    pub fn new(sample_rate: u32, buffer_size: usize) -> Self {
        Self::with_threshold(sample_rate, buffer_size, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(sample_rate: u32, buffer_size: usize, threshold: f32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            threshold,
            buffer: vec![0.0; (buffer_size / 2).max(1)],
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Estimate the pitch of `frame`. Frames shorter than twice the lag
    /// window only use the samples they have.
    pub fn get_pitch(&mut self, frame: &[f32]) -> PitchResult {
        self.difference(frame);
        self.cumulative_mean_normalized_difference();

        let Some(tau) = self.absolute_threshold() else {
            return PitchResult::unpitched();
        };

        let probability = (1.0 - self.buffer[tau]).clamp(0.0, 1.0);
        let better_tau = self.parabolic_interpolation(tau);
        if better_tau <= 0.0 {
            return PitchResult::unpitched();
        }

        PitchResult {
            pitch: self.sample_rate / better_tau,
            probability,
            is_pitched: true,
        }
    }

    /// d(tau) = sum over j of (x[j] - x[j + tau])^2
    fn difference(&mut self, frame: &[f32]) {
        let half = self.buffer.len();
        for tau in 0..half {
            let mut sum = 0.0f32;
            for j in 0..half {
                let (Some(&a), Some(&b)) = (frame.get(j), frame.get(j + tau)) else {
                    break;
                };
                let delta = a - b;
                sum += delta * delta;
            }
            self.buffer[tau] = sum;
        }
    }

    /// d'(0) = 1, d'(tau) = d(tau) / ((1/tau) * sum of d(1..=tau))
    fn cumulative_mean_normalized_difference(&mut self) {
        self.buffer[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..self.buffer.len() {
            running_sum += self.buffer[tau];
            if running_sum > 0.0 {
                self.buffer[tau] *= tau as f32 / running_sum;
            } else {
                self.buffer[tau] = 1.0;
            }
        }
    }

    /// First dip below the threshold, walked forward to its local minimum.
    fn absolute_threshold(&self) -> Option<usize> {
        let len = self.buffer.len();
        let mut tau = 2;
        while tau < len {
            if self.buffer[tau] < self.threshold {
                while tau + 1 < len && self.buffer[tau + 1] < self.buffer[tau] {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }
        None
    }

    fn parabolic_interpolation(&self, tau: usize) -> f32 {
        let len = self.buffer.len();
        let x0 = if tau < 1 { tau } else { tau - 1 };
        let x2 = if tau + 1 < len { tau + 1 } else { tau };

        if x0 == tau {
            return if self.buffer[tau] <= self.buffer[x2] {
                tau as f32
            } else {
                x2 as f32
            };
        }
        if x2 == tau {
            return if self.buffer[tau] <= self.buffer[x0] {
                tau as f32
            } else {
                x0 as f32
            };
        }

        let s0 = self.buffer[x0];
        let s1 = self.buffer[tau];
        let s2 = self.buffer[x2];
        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator.abs() < f32::EPSILON {
            return tau as f32;
        }
        tau as f32 + (s2 - s0) / denominator
    }
}
