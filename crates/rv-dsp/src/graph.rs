//! The assembled effect graph
//!
//! One shelf and one low-pass per channel, a per-channel convolution send
//! against the shared impulse, and a compressor linked across all channels.
//! Processing is planar and in place; blocks of any length are accepted.

use std::sync::Arc;

use crate::biquad::{BUTTERWORTH_Q, BiquadCoeffs, BiquadTDF2};
use crate::convolution::{OverlapAddConvolver, STREAMING_BLOCK_SIZE};
use crate::dynamics::Compressor;
use crate::impulse::ReverbImpulse;
use crate::params::{BASS_SHELF_FREQ_HZ, EffectSettings, GraphCoefficients};
use crate::smoothing::{LinearRamp, RAMP_TIME_MS};
use crate::{MonoProcessor, Processor, Sample};

/// How a parameter change reaches the running stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    /// Coefficients change before the next sample (offline rendering)
    #[default]
    Immediate,
    /// Linear ramp over [`RAMP_TIME_MS`] (live rendering)
    Ramp,
}

#[derive(Debug)]
struct ChannelStages {
    shelf: BiquadTDF2,
    lowpass: BiquadTDF2,
    /// Created the first time the send becomes non-zero
    reverb: Option<OverlapAddConvolver>,
}

/// Stateful effect chain for a fixed sample rate and channel count
#[derive(Debug)]
pub struct EffectGraph {
    sample_rate: f64,
    settings: EffectSettings,
    stages: Vec<ChannelStages>,
    compressor: Compressor,
    impulse: Arc<ReverbImpulse>,
    convolution_block: usize,

    bass_db: LinearRamp,
    cutoff_hz: LinearRamp,
    send: LinearRamp,

    // Coefficients outside a ramp
    shelf_coeffs: BiquadCoeffs,
    lowpass_coeffs: BiquadCoeffs,
    send_gain: f64,

    // Per-frame trajectories while a ramp is running
    shelf_track: Vec<BiquadCoeffs>,
    lowpass_track: Vec<BiquadCoeffs>,
    send_track: Vec<f64>,

    wet: Vec<Sample>,
}

impl EffectGraph {
    /// Graph for live, block-wise processing
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self::with_block_size(sample_rate, channels, STREAMING_BLOCK_SIZE)
    }

    /// Graph whose convolution runs on `block_size` frames per FFT
    pub fn with_block_size(sample_rate: u32, channels: usize, block_size: usize) -> Self {
        let impulse = ReverbImpulse::shared(sample_rate);
        let sr = sample_rate as f64;
        let settings = EffectSettings::default();
        let coeffs = settings.coefficients();

        let stages = (0..channels)
            .map(|_| ChannelStages {
                shelf: BiquadTDF2::new(sr),
                lowpass: BiquadTDF2::new(sr),
                reverb: None,
            })
            .collect();

        let mut graph = Self {
            sample_rate: sr,
            settings,
            stages,
            compressor: Compressor::new(sr),
            impulse,
            convolution_block: block_size.max(1),
            bass_db: LinearRamp::new(coeffs.bass_shelf_db, RAMP_TIME_MS, sr),
            cutoff_hz: LinearRamp::new(coeffs.lowpass_cutoff_hz, RAMP_TIME_MS, sr),
            send: LinearRamp::new(coeffs.reverb_send, RAMP_TIME_MS, sr),
            shelf_coeffs: BiquadCoeffs::bypass(),
            lowpass_coeffs: BiquadCoeffs::bypass(),
            send_gain: 0.0,
            shelf_track: Vec::new(),
            lowpass_track: Vec::new(),
            send_track: Vec::new(),
            wet: Vec::new(),
        };
        graph.apply(settings, Transition::Immediate);
        graph
    }

    /// Graph for rendering `frames` frames in one call, already set to `settings`
    pub fn offline(
        sample_rate: u32,
        channels: usize,
        frames: usize,
        settings: EffectSettings,
    ) -> Self {
        let block = frames.clamp(1, STREAMING_BLOCK_SIZE * 32).next_power_of_two();
        let mut graph = Self::with_block_size(sample_rate, channels, block);
        graph.apply(settings, Transition::Immediate);
        graph
    }

    /// Move the graph to `settings`
    pub fn apply(&mut self, settings: EffectSettings, transition: Transition) {
        let coeffs = settings.coefficients();
        match transition {
            Transition::Immediate => {
                self.bass_db.set_immediate(coeffs.bass_shelf_db);
                self.cutoff_hz.set_immediate(coeffs.lowpass_cutoff_hz);
                self.send.set_immediate(coeffs.reverb_send);
                self.shelf_coeffs = self.shelf_for(coeffs.bass_shelf_db);
                self.lowpass_coeffs = self.lowpass_for(coeffs.lowpass_cutoff_hz);
                self.send_gain = coeffs.reverb_send;
            }
            Transition::Ramp => {
                self.bass_db.set_target(coeffs.bass_shelf_db);
                self.cutoff_hz.set_target(coeffs.lowpass_cutoff_hz);
                self.send.set_target(coeffs.reverb_send);
            }
        }

        if coeffs.reverb_send > 0.0 {
            self.ensure_reverb();
        }

        log::debug!(
            "graph apply ({:?}): shelf {:.1} dB, cutoff {:.0} Hz, send {:.2}",
            transition,
            coeffs.bass_shelf_db,
            coeffs.lowpass_cutoff_hz,
            coeffs.reverb_send
        );
        self.settings = settings;
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    /// Target coefficients of the current settings
    pub fn coefficients(&self) -> GraphCoefficients {
        self.settings.coefficients()
    }

    pub fn channels(&self) -> usize {
        self.stages.len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn is_ramping(&self) -> bool {
        self.bass_db.is_smoothing() || self.cutoff_hz.is_smoothing() || self.send.is_smoothing()
    }

    pub fn has_reverb(&self) -> bool {
        self.stages.iter().any(|s| s.reverb.is_some())
    }

    /// Process planar `channels` in place; extra channels are left untouched
    pub fn process(&mut self, channels: &mut [Vec<Sample>]) {
        let count = channels.len().min(self.stages.len());
        let channels = &mut channels[..count];
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        if frames == 0 {
            return;
        }

        let ramp_frames = self.advance_ramps(frames);
        self.wet.resize(frames, 0.0);

        for (stages, channel) in self.stages.iter_mut().zip(channels.iter_mut()) {
            let channel = &mut channel[..frames];

            for (i, sample) in channel.iter_mut().enumerate() {
                if i < ramp_frames {
                    stages.shelf.set_coeffs(self.shelf_track[i]);
                    stages.lowpass.set_coeffs(self.lowpass_track[i]);
                } else if i == ramp_frames {
                    stages.shelf.set_coeffs(self.shelf_coeffs);
                    stages.lowpass.set_coeffs(self.lowpass_coeffs);
                }
                *sample = stages.lowpass.process_sample(stages.shelf.process_sample(*sample));
            }

            if let Some(reverb) = stages.reverb.as_mut() {
                let wet = &mut self.wet[..frames];
                reverb.process(channel, wet);
                for (i, (dry, wet)) in channel.iter_mut().zip(wet.iter()).enumerate() {
                    let send = if i < ramp_frames {
                        self.send_track[i]
                    } else {
                        self.send_gain
                    };
                    *dry += wet * send;
                }
            }
        }

        self.compressor.process_planar(channels);
    }

    /// Step the ramps across up to `frames` frames, filling the per-frame
    /// trajectories. Returns how many leading frames are ramped.
    fn advance_ramps(&mut self, frames: usize) -> usize {
        self.shelf_track.clear();
        self.lowpass_track.clear();
        self.send_track.clear();

        if !self.is_ramping() {
            return 0;
        }

        let ramp_frames = frames.min(
            self.bass_db
                .remaining()
                .max(self.cutoff_hz.remaining())
                .max(self.send.remaining()),
        );
        for _ in 0..ramp_frames {
            let gain_db = self.bass_db.next();
            let cutoff_hz = self.cutoff_hz.next();
            let send = self.send.next();
            let shelf = self.shelf_for(gain_db);
            let lowpass = self.lowpass_for(cutoff_hz);
            self.shelf_track.push(shelf);
            self.lowpass_track.push(lowpass);
            self.send_track.push(send);
        }

        self.shelf_coeffs = self.shelf_for(self.bass_db.current());
        self.lowpass_coeffs = self.lowpass_for(self.cutoff_hz.current());
        self.send_gain = self.send.current();
        ramp_frames
    }

    fn shelf_for(&self, gain_db: f64) -> BiquadCoeffs {
        BiquadCoeffs::low_shelf(BASS_SHELF_FREQ_HZ, BUTTERWORTH_Q, gain_db, self.sample_rate)
    }

    fn lowpass_for(&self, cutoff_hz: f64) -> BiquadCoeffs {
        BiquadCoeffs::lowpass(cutoff_hz, BUTTERWORTH_Q, self.sample_rate)
    }

    fn ensure_reverb(&mut self) {
        for (index, stages) in self.stages.iter_mut().enumerate() {
            if stages.reverb.is_none() {
                stages.reverb = Some(OverlapAddConvolver::new(
                    self.impulse.channel(index),
                    self.convolution_block,
                ));
            }
        }
    }
}

impl Processor for EffectGraph {
    fn reset(&mut self) {
        for stages in &mut self.stages {
            stages.shelf.reset();
            stages.lowpass.reset();
            if let Some(reverb) = stages.reverb.as_mut() {
                reverb.reset();
            }
        }
        self.compressor.reset();
    }
}
