//! Effect parameters and the coefficients derived from them

use serde::{Deserialize, Serialize};

/// Fixed corner frequency of the bass shelf
pub const BASS_SHELF_FREQ_HZ: f64 = 150.0;

/// Low-pass cutoff with `underwater_mix = 0`
pub const LOWPASS_OPEN_HZ: f64 = 20_000.0;

/// Cutoff travel across the full `underwater_mix` range
pub const LOWPASS_SWEEP_HZ: f64 = 19_500.0;

/// Cutoff floor
pub const LOWPASS_MIN_HZ: f64 = 20.0;

/// Shelf gain at `bass_gain = 1`
pub const BASS_MAX_DB: f64 = 12.0;

/// Reverb send at `reverb_mix = 1`
pub const REVERB_SEND_MAX: f64 = 2.0;

/// User-facing effect parameters.
///
/// Immutable value: every parameter change produces a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectSettings {
    /// Playback speed ratio (> 0)
    pub speed: f64,
    /// Pitch offset in semitones
    pub pitch_semitones: f64,
    /// Reverb amount (0..1)
    pub reverb_mix: f64,
    /// Bass shelf amount (0..1)
    pub bass_gain: f64,
    /// Low-pass "underwater" amount (0..1)
    pub underwater_mix: f64,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch_semitones: 0.0,
            reverb_mix: 0.0,
            bass_gain: 0.0,
            underwater_mix: 0.0,
        }
    }
}

impl EffectSettings {
    /// "Slowed + reverb" preset
    pub fn slowed() -> Self {
        Self {
            speed: 0.8,
            pitch_semitones: -1.0,
            reverb_mix: 0.3,
            bass_gain: 0.1,
            underwater_mix: 0.0,
        }
    }

    /// "Nightcore" preset
    pub fn nightcore() -> Self {
        Self {
            speed: 1.3,
            pitch_semitones: 3.0,
            reverb_mix: 0.1,
            bass_gain: 0.2,
            underwater_mix: 0.0,
        }
    }

    pub fn with_speed(self, speed: f64) -> Self {
        Self { speed, ..self }
    }

    pub fn with_pitch(self, pitch_semitones: f64) -> Self {
        Self { pitch_semitones, ..self }
    }

    pub fn with_reverb(self, reverb_mix: f64) -> Self {
        Self { reverb_mix, ..self }
    }

    pub fn with_bass(self, bass_gain: f64) -> Self {
        Self { bass_gain, ..self }
    }

    pub fn with_underwater(self, underwater_mix: f64) -> Self {
        Self { underwater_mix, ..self }
    }

    /// Bass shelf gain in dB
    pub fn bass_shelf_db(&self) -> f64 {
        self.bass_gain * BASS_MAX_DB
    }

    /// Low-pass cutoff in Hz, never below 20 Hz (500 Hz at full mix)
    pub fn lowpass_cutoff_hz(&self) -> f64 {
        (LOWPASS_OPEN_HZ - self.underwater_mix * LOWPASS_SWEEP_HZ).max(LOWPASS_MIN_HZ)
    }

    /// Linear gain of the reverb send
    pub fn reverb_send(&self) -> f64 {
        self.reverb_mix * REVERB_SEND_MAX
    }

    /// Source playback-rate multiplier (speed combined with pitch)
    pub fn playback_rate(&self) -> f64 {
        self.speed * 2.0_f64.powf(self.pitch_semitones / 12.0)
    }

    /// Derive the full coefficient set
    pub fn coefficients(&self) -> GraphCoefficients {
        GraphCoefficients::from_settings(self)
    }
}

/// Stage coefficients derived deterministically from [`EffectSettings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphCoefficients {
    pub bass_shelf_db: f64,
    pub bass_shelf_freq_hz: f64,
    pub lowpass_cutoff_hz: f64,
    pub reverb_send: f64,
    pub playback_rate: f64,
}

impl GraphCoefficients {
    pub fn from_settings(settings: &EffectSettings) -> Self {
        Self {
            bass_shelf_db: settings.bass_shelf_db(),
            bass_shelf_freq_hz: BASS_SHELF_FREQ_HZ,
            lowpass_cutoff_hz: settings.lowpass_cutoff_hz(),
            reverb_send: settings.reverb_send(),
            playback_rate: settings.playback_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_coefficients() {
        let c = EffectSettings::default().coefficients();
        assert_eq!(c.bass_shelf_db, 0.0);
        assert_eq!(c.bass_shelf_freq_hz, 150.0);
        assert_eq!(c.lowpass_cutoff_hz, 20_000.0);
        assert_eq!(c.reverb_send, 0.0);
        assert_eq!(c.playback_rate, 1.0);
    }

    #[test]
    fn test_cutoff_monotonic_and_clamped() {
        let mut previous = f64::INFINITY;
        for step in 0..=100 {
            let mix = step as f64 / 100.0;
            let cutoff = EffectSettings::default().with_underwater(mix).lowpass_cutoff_hz();
            assert!(cutoff <= previous, "cutoff rose at mix {mix}");
            previous = cutoff;
        }
        assert_eq!(
            EffectSettings::default().with_underwater(1.0).lowpass_cutoff_hz(),
            500.0
        );
        // The floor only engages for out-of-range mixes
        assert_eq!(
            EffectSettings::default().with_underwater(1.5).lowpass_cutoff_hz(),
            20.0
        );
    }

    #[test]
    fn test_playback_rate_combines_speed_and_pitch() {
        let settings = EffectSettings::default().with_speed(0.8).with_pitch(12.0);
        assert_relative_eq!(settings.playback_rate(), 1.6, epsilon = 1e-12);

        let slowed = EffectSettings::slowed();
        assert_relative_eq!(
            slowed.playback_rate(),
            0.8 * 2.0_f64.powf(-1.0 / 12.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_shelf_and_send_scaling() {
        let settings = EffectSettings::default().with_bass(0.5).with_reverb(0.25);
        assert_relative_eq!(settings.bass_shelf_db(), 6.0);
        assert_relative_eq!(settings.reverb_send(), 0.5);
    }

    #[test]
    fn test_settings_deserialize_camel_case_with_defaults() {
        let settings: EffectSettings =
            serde_json::from_str(r#"{"speed":0.8,"pitchSemitones":-1}"#).unwrap();
        assert_eq!(settings.speed, 0.8);
        assert_eq!(settings.pitch_semitones, -1.0);
        assert_eq!(settings.reverb_mix, 0.0);
    }
}
