//! Reverb impulse response
//!
//! Exponentially decaying stereo noise, 2 seconds long. Built once per
//! sample rate and shared read-only by every graph in the process.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Impulse channel count
pub const IMPULSE_CHANNELS: usize = 2;

/// Impulse duration in seconds
pub const IMPULSE_SECONDS: u32 = 2;

/// Exponent of the `(1 - t)^decay` envelope
pub const IMPULSE_DECAY: f64 = 2.0;

/// Fixed noise seed so offline renders are reproducible
const IMPULSE_SEED: u64 = 0x5EED_0F_2EB5;

static IMPULSE_CACHE: OnceLock<Mutex<HashMap<u32, Arc<ReverbImpulse>>>> = OnceLock::new();

/// Immutable stereo impulse response
#[derive(Debug)]
pub struct ReverbImpulse {
    sample_rate: u32,
    channels: [Vec<f64>; IMPULSE_CHANNELS],
}

impl ReverbImpulse {
    /// Build a fresh impulse for `sample_rate`
    pub fn generate(sample_rate: u32) -> Self {
        let len = (sample_rate * IMPULSE_SECONDS) as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(IMPULSE_SEED);

        let channels = std::array::from_fn(|_| {
            (0..len)
                .map(|i| {
                    let noise: f64 = rng.random_range(-1.0..1.0);
                    noise * (1.0 - i as f64 / len as f64).powf(IMPULSE_DECAY)
                })
                .collect()
        });

        Self {
            sample_rate,
            channels,
        }
    }

    /// Shared impulse for `sample_rate`, built on first use
    pub fn shared(sample_rate: u32) -> Arc<ReverbImpulse> {
        let cache = IMPULSE_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut cache = cache.lock();
        cache
            .entry(sample_rate)
            .or_insert_with(|| {
                log::debug!("Building reverb impulse for {} Hz", sample_rate);
                Arc::new(Self::generate(sample_rate))
            })
            .clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Impulse channel feeding output channel `index` (wraps for >2 channels)
    pub fn channel(&self, index: usize) -> &[f64] {
        &self.channels[index % IMPULSE_CHANNELS]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape() {
        let ir = ReverbImpulse::generate(8000);
        assert_eq!(ir.channel(0).len(), 16000);
        assert_eq!(ir.channel(1).len(), 16000);
        assert_eq!(ir.sample_rate(), 8000);
        assert!(ir.channel(0).iter().all(|s| s.abs() <= 1.0));
        // Decays towards silence
        let head: f64 = ir.channel(0)[..1000].iter().map(|s| s.abs()).sum();
        let tail: f64 = ir.channel(0)[15000..].iter().map(|s| s.abs()).sum();
        assert!(tail < head * 0.05);
        // Channels are decorrelated
        assert_ne!(ir.channel(0)[..100], ir.channel(1)[..100]);
    }

    #[test]
    fn test_channel_index_wraps() {
        let ir = ReverbImpulse::generate(1000);
        assert_eq!(ir.channel(2), ir.channel(0));
        assert_eq!(ir.channel(3), ir.channel(1));
    }

    #[test]
    fn test_shared_is_cached_per_rate() {
        let a = ReverbImpulse::shared(11025);
        let b = ReverbImpulse::shared(11025);
        let c = ReverbImpulse::shared(22050);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_deterministic() {
        let a = ReverbImpulse::generate(4000);
        let b = ReverbImpulse::generate(4000);
        assert_eq!(a.channel(0), b.channel(0));
        assert_eq!(a.channel(1), b.channel(1));
    }
}
