//! Linear parameter ramps
//!
//! Used by the live graph to move stage parameters to new values without
//! audible steps. The offline path never ramps.

/// Ramp duration for live parameter changes
pub const RAMP_TIME_MS: f64 = 50.0;

/// Constant-rate ramp from the current value to a target
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f64,
    target: f64,
    step: f64,
    remaining: usize,
    ramp_samples: usize,
}

impl LinearRamp {
    pub fn new(initial_value: f64, ramp_time_ms: f64, sample_rate: f64) -> Self {
        let ramp_samples = ((ramp_time_ms / 1000.0) * sample_rate).round().max(0.0) as usize;
        Self {
            current: initial_value,
            target: initial_value,
            step: 0.0,
            remaining: 0,
            ramp_samples,
        }
    }

    /// Start a ramp towards `value` from wherever the ramp currently is
    pub fn set_target(&mut self, value: f64) {
        if self.ramp_samples == 0 {
            self.set_immediate(value);
            return;
        }
        self.target = value;
        self.remaining = self.ramp_samples;
        self.step = (value - self.current) / self.ramp_samples as f64;
    }

    /// Jump to `value`, cancelling any ramp in progress
    pub fn set_immediate(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }

    /// Samples left until the target is reached
    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn ramp_samples(&self) -> usize {
        self.ramp_samples
    }

    /// Advance one sample
    #[inline]
    pub fn next(&mut self) -> f64 {
        match self.remaining {
            0 => {}
            1 => {
                // Land exactly on the target
                self.current = self.target;
                self.remaining = 0;
            }
            _ => {
                self.current += self.step;
                self.remaining -= 1;
            }
        }
        self.current
    }
}
