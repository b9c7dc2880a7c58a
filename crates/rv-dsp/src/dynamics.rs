//! Dynamics: envelope follower and a channel-linked hard-knee compressor
//!
//! The compressor sits at the end of the graph, after the dry and reverb
//! paths are summed. Its threshold is full scale, so a dry signal inside
//! [-1, 1] passes untouched and only an overshooting sum is pulled back.

use crate::{Processor, Sample, db_to_gain};

/// Threshold (dBFS)
pub const DEFAULT_THRESHOLD_DB: f64 = 0.0;
/// Ratio above threshold
pub const DEFAULT_RATIO: f64 = 4.0;
/// Attack (ms)
pub const DEFAULT_ATTACK_MS: f64 = 3.0;
/// Release (ms)
pub const DEFAULT_RELEASE_MS: f64 = 250.0;

/// Envelope follower for dynamics processing
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
    sample_rate: f64,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f64) -> Self {
        let mut follower = Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            sample_rate,
        };
        follower.set_times(DEFAULT_ATTACK_MS, DEFAULT_RELEASE_MS);
        follower
    }

    /// Set attack and release times in milliseconds
    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_coeff = (-1.0 / (attack_ms * 0.001 * self.sample_rate)).exp();
        self.release_coeff = (-1.0 / (release_ms * 0.001 * self.sample_rate)).exp();
    }

    #[inline(always)]
    pub fn process(&mut self, input: Sample) -> f64 {
        let abs_input = input.abs();
        let coeff = if abs_input > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = abs_input + coeff * (self.envelope - abs_input);
        self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

/// Hard-knee VCA compressor with one detector shared by all channels
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f64,
    ratio: f64,

    envelope: EnvelopeFollower,
    gain_reduction: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            threshold_db: DEFAULT_THRESHOLD_DB,
            ratio: DEFAULT_RATIO,
            envelope: EnvelopeFollower::new(sample_rate),
            gain_reduction: 0.0,
        }
    }

    /// Get current gain reduction in dB
    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction
    }

    #[inline]
    fn calculate_gain_reduction(&self, input_db: f64) -> f64 {
        if input_db <= self.threshold_db {
            0.0
        } else {
            (input_db - self.threshold_db) * (1.0 - 1.0 / self.ratio)
        }
    }

    /// Process one frame in place; `frame` holds one sample per channel
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [Sample]) {
        let peak = frame.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
        let envelope = self.envelope.process(peak);

        if envelope < 1e-10 {
            self.gain_reduction = 0.0;
            return;
        }

        let env_db = 20.0 * envelope.log10();
        let gr_db = self.calculate_gain_reduction(env_db);
        self.gain_reduction = gr_db;

        if gr_db > 0.0 {
            let gain = db_to_gain(-gr_db);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Process planar channels in place, frame by frame
    pub fn process_planar(&mut self, channels: &mut [Vec<Sample>]) {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        let mut frame = vec![0.0; channels.len()];

        for i in 0..frames {
            for (slot, channel) in frame.iter_mut().zip(channels.iter()) {
                *slot = channel[i];
            }
            self.process_frame(&mut frame);
            for (channel, &value) in channels.iter_mut().zip(frame.iter()) {
                channel[i] = value;
            }
        }
    }
}

impl Processor for Compressor {
    fn reset(&mut self) {
        self.envelope.reset();
        self.gain_reduction = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_up_to_full_scale() {
        let mut comp = Compressor::new(44100.0);
        for i in 0..4410 {
            let value = ((i as f64) * 0.05).sin();
            let mut frame = [value, -value * 0.9];
            comp.process_frame(&mut frame);
            assert_eq!(frame, [value, -value * 0.9]);
        }
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_reduces_overshooting_sum() {
        let mut comp = Compressor::new(44100.0);
        let mut last = [0.0; 2];
        for _ in 0..44100 {
            let mut frame = [2.0, 1.5];
            comp.process_frame(&mut frame);
            last = frame;
        }
        // 6 dB over at 4:1 settles near 4.5 dB of reduction
        assert!((comp.gain_reduction_db() - 4.5).abs() < 0.1);
        assert!(last[0] < 2.0);
        // Linked detector: both channels get the same gain
        assert!((last[1] / last[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_gain_curve_at_threshold() {
        let comp = Compressor::new(48000.0);
        assert_eq!(comp.calculate_gain_reduction(-0.5), 0.0);
        assert_eq!(comp.calculate_gain_reduction(0.0), 0.0);
        let above = comp.calculate_gain_reduction(8.0);
        assert!((above - 6.0).abs() < 1e-12);
        assert!(!comp.calculate_gain_reduction(1e-9).is_nan());
    }
}
