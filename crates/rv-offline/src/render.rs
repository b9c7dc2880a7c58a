//! Offline renderer
//!
//! Drives a whole buffer through a fresh [`EffectGraph`] at the combined
//! speed/pitch playback rate. Nothing is shared with any live graph apart
//! from the read-only reverb impulse.

use rv_dsp::{EffectGraph, EffectSettings, Sample};

use crate::buffer::AudioBuffer;
use crate::error::{OfflineError, OfflineResult};

/// Tolerance for the output-length ceiling, absorbs `frames / speed` rounding
const LENGTH_EPSILON: f64 = 1e-9;

/// Offline renderer
pub struct OfflineRenderer;

impl OfflineRenderer {
    /// Render `buffer` with `settings` into a new buffer.
    ///
    /// Output length is `ceil(frames / speed)` at the input sample rate.
    pub fn render(buffer: &AudioBuffer, settings: &EffectSettings) -> OfflineResult<AudioBuffer> {
        if buffer.is_empty() {
            return Err(OfflineError::Render("input buffer is empty".into()));
        }
        if !settings.speed.is_finite() || settings.speed <= 0.0 {
            return Err(OfflineError::Render(format!(
                "speed {} gives no output",
                settings.speed
            )));
        }
        let rate = settings.playback_rate();
        if !rate.is_finite() || rate <= 0.0 {
            return Err(OfflineError::Render(format!("invalid playback rate {}", rate)));
        }

        let output_frames = output_frame_count(buffer.frame_count(), settings.speed);
        if output_frames == 0 {
            return Err(OfflineError::Render("output length is zero".into()));
        }

        log::debug!(
            "Rendering {} ch x {} frames @ {} Hz -> {} frames (rate {:.4})",
            buffer.channel_count(),
            buffer.frame_count(),
            buffer.sample_rate(),
            output_frames,
            rate
        );

        let mut planar: Vec<Vec<Sample>> = buffer
            .channels()
            .iter()
            .map(|channel| resample_linear(channel, rate, output_frames))
            .collect();

        let mut graph = EffectGraph::offline(
            buffer.sample_rate(),
            buffer.channel_count(),
            output_frames,
            *settings,
        );
        graph.process(&mut planar);

        let channels = planar
            .into_iter()
            .map(|channel| channel.into_iter().map(|s| s as f32).collect())
            .collect();
        AudioBuffer::new(buffer.sample_rate(), channels)
    }
}

/// `ceil(frames / speed)`
pub fn output_frame_count(frames: usize, speed: f64) -> usize {
    let exact = frames as f64 / speed;
    (exact - LENGTH_EPSILON).ceil().max(0.0) as usize
}

/// Read `source` at `rate` source frames per output frame, linear
/// interpolation, silence past the end.
fn resample_linear(source: &[f32], rate: f64, output_frames: usize) -> Vec<Sample> {
    let at = |index: usize| source.get(index).copied().map_or(0.0, f64::from);

    (0..output_frames)
        .map(|frame| {
            let src_pos = frame as f64 * rate;
            let src_frame = src_pos.floor() as usize;
            let frac = src_pos - src_frame as f64;

            let s0 = at(src_frame);
            if frac == 0.0 {
                return s0;
            }
            let s1 = at(src_frame + 1);
            s0 + (s1 - s0) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_length() {
        assert_eq!(output_frame_count(44100, 0.8), 55125);
        assert_eq!(output_frame_count(44100, 1.0), 44100);
        assert_eq!(output_frame_count(10, 3.0), 4);
        assert_eq!(output_frame_count(1, 1000.0), 1);
    }

    #[test]
    fn test_resample_unity_is_exact() {
        let source = [0.1_f32, -0.2, 0.3];
        let out = resample_linear(&source, 1.0, 4);
        assert_eq!(out, vec![0.1_f32 as f64, -0.2_f32 as f64, 0.3_f32 as f64, 0.0]);
    }

    #[test]
    fn test_resample_half_rate_interpolates() {
        let source = [0.0_f32, 1.0];
        let out = resample_linear(&source, 0.5, 4);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_render_rejects_bad_input() {
        let empty = AudioBuffer::silence(44100, 2, 0).unwrap();
        let err = OfflineRenderer::render(&empty, &EffectSettings::default()).unwrap_err();
        assert!(matches!(err, OfflineError::Render(_)));

        let buffer = AudioBuffer::silence(44100, 2, 100).unwrap();
        for speed in [0.0, -1.0, f64::NAN] {
            let settings = EffectSettings::default().with_speed(speed);
            assert!(matches!(
                OfflineRenderer::render(&buffer, &settings),
                Err(OfflineError::Render(_))
            ));
        }
    }

    #[test]
    fn test_render_preserves_format() {
        let buffer = AudioBuffer::silence(22050, 1, 2205).unwrap();
        let rendered = OfflineRenderer::render(&buffer, &EffectSettings::nightcore()).unwrap();
        assert_eq!(rendered.sample_rate(), 22050);
        assert_eq!(rendered.channel_count(), 1);
        assert_eq!(rendered.frame_count(), output_frame_count(2205, 1.3));
    }
}
