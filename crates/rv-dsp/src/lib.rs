//! rv-dsp: Effect graph engine for Reverie
//!
//! Pure mapping from [`EffectSettings`] to a chain of signal-processing
//! stages, plus the stateful stages themselves.
//!
//! ## Signal path
//!
//! ```text
//! input → bass shelf → low-pass ─┬──────────────────────────────┬→ compressor → output
//!                                └→ reverb convolution × send ──┘
//! ```
//!
//! ## Modules
//! - `params` - `EffectSettings` and derived `GraphCoefficients`
//! - `biquad` - TDF-II biquad filters (low-pass, low shelf)
//! - `dynamics` - Envelope follower and channel-linked compressor
//! - `convolution` - FFT overlap-add convolution (realfft)
//! - `impulse` - Process-wide cached reverb impulse responses
//! - `smoothing` - Linear parameter ramps for live updates
//! - `graph` - The assembled `EffectGraph`

pub mod biquad;
pub mod convolution;
pub mod dynamics;
pub mod graph;
pub mod impulse;
pub mod params;
pub mod smoothing;

pub use graph::{EffectGraph, Transition};
pub use params::{EffectSettings, GraphCoefficients};

/// Sample type used inside the graph (f64 for headroom while filtering)
pub type Sample = f64;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Convert decibels to linear gain
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to decibels
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}
