//! Audio encoding module
//!
//! Supports:
//! - WAV: 32-bit float, fixed 44-byte header, written natively
//! - MP3 (via mp3lame-encoder): native LAME, CBR, fed in fixed-size blocks

use std::mem::MaybeUninit;

use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushGap, Quality};

use crate::buffer::AudioBuffer;
use crate::config::Mp3Config;
use crate::error::{OfflineError, OfflineResult};
use crate::formats::OutputFormat;

// ═══════════════════════════════════════════════════════════════════════════════
// ENCODER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Audio encoder trait
pub trait AudioEncoder {
    /// Encode audio buffer to bytes
    fn encode(&self, buffer: &AudioBuffer) -> OfflineResult<Vec<u8>>;

    /// Format produced
    fn format(&self) -> OutputFormat;

    /// Get file extension
    fn extension(&self) -> &'static str {
        self.format().extension()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAV ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of the canonical RIFF/WAVE header
pub const WAV_HEADER_LEN: usize = 44;

const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WAV_BITS_PER_SAMPLE: u16 = 32;

/// 32-bit float WAV writer
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn encode(&self, buffer: &AudioBuffer) -> OfflineResult<Vec<u8>> {
        let channels = buffer.channel_count();
        let frames = buffer.frame_count();
        let bytes_per_sample = (WAV_BITS_PER_SAMPLE / 8) as usize;

        let data_size = channels
            .checked_mul(frames)
            .and_then(|n| n.checked_mul(bytes_per_sample))
            .filter(|&n| n <= (u32::MAX as usize) - 36)
            .ok_or_else(|| {
                OfflineError::Encode(format!(
                    "{} ch x {} frames does not fit a WAV data chunk",
                    channels, frames
                ))
            })? as u32;
        let channel_field = u16::try_from(channels)
            .map_err(|_| OfflineError::Encode(format!("too many channels: {}", channels)))?;

        let block_align = channel_field * (WAV_BITS_PER_SAMPLE / 8);
        let byte_rate = buffer.sample_rate() * block_align as u32;

        let mut output = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);

        // RIFF chunk
        output.extend_from_slice(b"RIFF");
        output.extend_from_slice(&(36 + data_size).to_le_bytes());
        output.extend_from_slice(b"WAVE");

        // fmt chunk
        output.extend_from_slice(b"fmt ");
        output.extend_from_slice(&16u32.to_le_bytes());
        output.extend_from_slice(&WAVE_FORMAT_IEEE_FLOAT.to_le_bytes());
        output.extend_from_slice(&channel_field.to_le_bytes());
        output.extend_from_slice(&buffer.sample_rate().to_le_bytes());
        output.extend_from_slice(&byte_rate.to_le_bytes());
        output.extend_from_slice(&block_align.to_le_bytes());
        output.extend_from_slice(&WAV_BITS_PER_SAMPLE.to_le_bytes());

        // data chunk, frame-major
        output.extend_from_slice(b"data");
        output.extend_from_slice(&data_size.to_le_bytes());
        for frame in 0..frames {
            for channel in buffer.channels() {
                output.extend_from_slice(&channel[frame].to_le_bytes());
            }
        }

        Ok(output)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Wav
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MP3 ENCODER (Native LAME)
// ═══════════════════════════════════════════════════════════════════════════════

/// Frames handed to LAME per encode call
pub const MP3_BLOCK_FRAMES: usize = 1152 * 256;

/// Space LAME may need for the final flush
const MP3_FLUSH_RESERVE: usize = 7200;

/// Native MP3 encoder using LAME via mp3lame-encoder crate
#[derive(Debug, Clone, Copy, Default)]
pub struct LameMp3Encoder {
    config: Mp3Config,
}

impl LameMp3Encoder {
    pub fn new(config: Mp3Config) -> Self {
        Self { config }
    }

    /// Convert kbps to LAME bitrate enum
    fn get_lame_bitrate(&self) -> Bitrate {
        match self.config.bitrate_kbps {
            0..=111 => Bitrate::Kbps96,
            112..=127 => Bitrate::Kbps112,
            128..=159 => Bitrate::Kbps128,
            160..=191 => Bitrate::Kbps160,
            192..=223 => Bitrate::Kbps192,
            224..=255 => Bitrate::Kbps224,
            256..=319 => Bitrate::Kbps256,
            _ => Bitrate::Kbps320,
        }
    }
}

/// Hard-clip to [-1, 1] and scale asymmetrically to the i16 range
#[inline]
pub fn float_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

impl AudioEncoder for LameMp3Encoder {
    fn encode(&self, buffer: &AudioBuffer) -> OfflineResult<Vec<u8>> {
        // LAME takes at most a stereo pair; mono feeds the same PCM twice
        let lame_channels = buffer.channel_count().min(2) as u8;

        let mut builder = Builder::new()
            .ok_or_else(|| OfflineError::Encode("LAME encoder init failed".to_string()))?;

        builder
            .set_num_channels(lame_channels)
            .map_err(|e| OfflineError::Encode(format!("LAME set channels failed: {:?}", e)))?;

        builder.set_sample_rate(buffer.sample_rate()).map_err(|e| {
            OfflineError::Encode(format!("LAME set sample rate failed: {:?}", e))
        })?;

        builder
            .set_brate(self.get_lame_bitrate())
            .map_err(|e| OfflineError::Encode(format!("LAME set bitrate failed: {:?}", e)))?;

        builder
            .set_quality(Quality::Best)
            .map_err(|e| OfflineError::Encode(format!("LAME set quality failed: {:?}", e)))?;

        let mut encoder = builder
            .build()
            .map_err(|e| OfflineError::Encode(format!("LAME build failed: {:?}", e)))?;

        let left: Vec<i16> = buffer.channel(0).iter().copied().map(float_to_i16).collect();
        let right: Vec<i16> = if buffer.channel_count() > 1 {
            buffer.channel(1).iter().copied().map(float_to_i16).collect()
        } else {
            left.clone()
        };

        let mut mp3_output: Vec<u8> = Vec::new();

        for (left_block, right_block) in left
            .chunks(MP3_BLOCK_FRAMES)
            .zip(right.chunks(MP3_BLOCK_FRAMES))
        {
            mp3_output.reserve(mp3lame_encoder::max_required_buffer_size(left_block.len()));
            let input = DualPcm {
                left: left_block,
                right: right_block,
            };
            let encoded_size = encoder
                .encode(input, mp3_output.spare_capacity_mut())
                .map_err(|e| OfflineError::Encode(format!("LAME encode failed: {:?}", e)))?;
            commit_spare(&mut mp3_output, encoded_size);
        }

        // Full flush so the last partial frame is written out
        mp3_output.reserve(MP3_FLUSH_RESERVE);
        let flush_size = encoder
            .flush::<FlushGap>(mp3_output.spare_capacity_mut())
            .map_err(|e| OfflineError::Encode(format!("LAME flush failed: {:?}", e)))?;
        commit_spare(&mut mp3_output, flush_size);

        if mp3_output.is_empty() {
            return Err(OfflineError::Encode("LAME produced no output".into()));
        }

        log::debug!(
            "MP3 encoded {} frames -> {} bytes",
            buffer.frame_count(),
            mp3_output.len()
        );
        Ok(mp3_output)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Mp3
    }
}

/// Grow `output` over bytes the encoder wrote into its spare capacity
fn commit_spare(output: &mut Vec<u8>, written: usize) {
    let spare: &[MaybeUninit<u8>] = output.spare_capacity_mut();
    let written = written.min(spare.len());
    // SAFETY: the encoder initialized `written` bytes of spare capacity,
    // and `written` is bounded by that capacity.
    unsafe {
        output.set_len(output.len() + written);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_layout() {
        let buffer = AudioBuffer::new(48000, vec![vec![0.5, -0.5], vec![0.25, -0.25]]).unwrap();
        let bytes = WavEncoder.encode(&buffer).unwrap();

        assert_eq!(bytes.len(), 44 + 2 * 2 * 4);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 36 + 16);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 3);
        assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 48000);
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 48000 * 8);
        assert_eq!(u16::from_le_bytes(bytes[32..34].try_into().unwrap()), 8);
        assert_eq!(u16::from_le_bytes(bytes[34..36].try_into().unwrap()), 32);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 16);

        // Interleaved: L0 R0 L1 R1
        let samples: Vec<f32> = bytes[44..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(samples, vec![0.5, 0.25, -0.5, -0.25]);
    }

    #[test]
    fn test_float_to_i16_clips() {
        assert_eq!(float_to_i16(0.0), 0);
        assert_eq!(float_to_i16(1.0), 32767);
        assert_eq!(float_to_i16(-1.0), -32768);
        assert_eq!(float_to_i16(2.5), 32767);
        assert_eq!(float_to_i16(-7.0), -32768);
        assert_eq!(float_to_i16(0.5), 16383);
    }

    #[test]
    fn test_bitrate_mapping() {
        let lame = |kbps| LameMp3Encoder::new(Mp3Config { bitrate_kbps: kbps });
        assert!(matches!(lame(320).get_lame_bitrate(), Bitrate::Kbps320));
        assert!(matches!(lame(192).get_lame_bitrate(), Bitrate::Kbps192));
        assert_eq!(lame(320).extension(), "mp3");
        assert_eq!(WavEncoder.extension(), "wav");
    }
}
