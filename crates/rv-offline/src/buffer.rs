//! Immutable planar audio buffer

use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, OfflineResult};

/// Decoded or rendered audio: planar f32, every channel the same length.
///
/// Never mutated after construction; transformations build a new buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

/// Buffer metadata as it crosses the pool boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferHeader {
    pub sample_rate: u32,
    pub frame_count: usize,
    pub channel_count: usize,
}

impl AudioBuffer {
    /// Build from planar channels, checking the shape invariants
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> OfflineResult<Self> {
        if sample_rate == 0 {
            return Err(OfflineError::InvalidBuffer("sample rate must be > 0".into()));
        }
        let Some(first) = channels.first() else {
            return Err(OfflineError::InvalidBuffer("at least one channel required".into()));
        };
        let frames = first.len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != frames)
        {
            return Err(OfflineError::InvalidBuffer(format!(
                "channel {} has {} frames, channel 0 has {}",
                index,
                channel.len(),
                frames
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// All-zero buffer
    pub fn silence(sample_rate: u32, channel_count: usize, frames: usize) -> OfflineResult<Self> {
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Release the sample storage without copying
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    pub fn header(&self) -> BufferHeader {
        BufferHeader {
            sample_rate: self.sample_rate,
            frame_count: self.frame_count(),
            channel_count: self.channel_count(),
        }
    }

    /// Absolute peak across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|channel| channel.iter())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_invariants() {
        assert!(AudioBuffer::new(0, vec![vec![0.0]]).is_err());
        assert!(AudioBuffer::new(44100, vec![]).is_err());

        let ragged = AudioBuffer::new(44100, vec![vec![0.0; 3], vec![0.0; 2]]);
        assert!(matches!(ragged, Err(OfflineError::InvalidBuffer(_))));
    }

    #[test]
    fn test_header_and_duration() {
        let buffer = AudioBuffer::silence(48000, 2, 24000).unwrap();
        assert_eq!(
            buffer.header(),
            BufferHeader {
                sample_rate: 48000,
                frame_count: 24000,
                channel_count: 2
            }
        );
        assert_eq!(buffer.duration(), 0.5);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_header_serializes_camel_case() {
        let header = AudioBuffer::silence(44100, 1, 10).unwrap().header();
        let json = serde_json::to_string(&header).unwrap();
        assert_eq!(json, r#"{"sampleRate":44100,"frameCount":10,"channelCount":1}"#);
    }
}
