//! Encode tasks and results
//!
//! An [`EncodeTask`] owns its rendered buffer. Submitting it to the pool
//! moves the samples into the unit; nothing is copied on the way.

use rv_dsp::EffectSettings;
use serde::{Deserialize, Serialize};

use crate::buffer::{AudioBuffer, BufferHeader};
use crate::config::Mp3Config;
use crate::encoder::{AudioEncoder, LameMp3Encoder, WavEncoder};
use crate::error::{OfflineError, OfflineResult};
use crate::formats::{OutputFormat, RequestedFormats};
use crate::pool::PoolJob;
use crate::tags::{TrackMetadata, embed_id3};

/// Task identifier, unique per pool
pub type TaskId = u64;

/// The settings that end up in output filenames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilenameSeed {
    pub speed: f64,
    pub pitch: f64,
    pub reverb: f64,
    /// Source file name, extension included
    pub file_name: String,
}

impl FilenameSeed {
    pub fn new(file_name: impl Into<String>, settings: &EffectSettings) -> Self {
        Self {
            speed: settings.speed,
            pitch: settings.pitch_semitones,
            reverb: settings.reverb_mix,
            file_name: file_name.into(),
        }
    }

    /// Source name up to the last `.`, or the whole name when that is empty
    pub fn base_name(&self) -> &str {
        self.file_name
            .rfind('.')
            .map(|dot| &self.file_name[..dot])
            .filter(|base| !base.is_empty())
            .unwrap_or(&self.file_name)
    }

    /// `<base>_s<speed:.2>_p<pitch:.1>_r<round(reverb*100)>.<ext>`
    pub fn file_name(&self, format: OutputFormat) -> String {
        format!(
            "{}_s{}_p{}_r{}.{}",
            self.base_name(),
            to_fixed(self.speed, 2),
            // Avoid "-0.0" for a pitch of negative zero
            to_fixed(self.pitch + 0.0, 1),
            (self.reverb * 100.0).round() as i64,
            format.extension()
        )
    }
}

/// Fixed-point text with `digits` decimals, exact ties rounded away from zero.
///
/// `{:.N}` already rounds the exact binary value correctly except on a true
/// decimal tie, where it picks the even digit. A tie at `digits` decimals
/// exists exactly when `value * 2^(digits + 1)` is an odd integer.
fn to_fixed(value: f64, digits: u32) -> String {
    let doubled = value * f64::from(1u32 << (digits + 1));
    let is_tie = doubled.fract() == 0.0
        && doubled.abs() < 9_007_199_254_740_992.0
        && (doubled.abs() as u64) % 2 == 1;
    if !is_tie {
        return format!("{:.*}", digits as usize, value);
    }

    let scaled = (doubled.abs() as u128 * 5u128.pow(digits) + 1) / 2;
    let scale = 10u128.pow(digits);
    let sign = if value < 0.0 { "-" } else { "" };
    if digits == 0 {
        format!("{sign}{scaled}")
    } else {
        format!(
            "{sign}{}.{:0width$}",
            scaled / scale,
            scaled % scale,
            width = digits as usize
        )
    }
}

/// One encoded output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedFile {
    pub payload_bytes: Vec<u8>,
    pub file_name: String,
    pub format: OutputFormat,
}

/// Whole-task outcome: every requested output or one failure
pub type EncodeResult = OfflineResult<Vec<EncodedFile>>;

/// Failure shape reported back across the pool boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeFailureMessage {
    pub error: String,
}

impl From<&OfflineError> for EncodeFailureMessage {
    fn from(err: &OfflineError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Request to encode one rendered buffer
#[derive(Debug)]
pub struct EncodeTask {
    buffer: AudioBuffer,
    seed: FilenameSeed,
    formats: RequestedFormats,
    metadata: TrackMetadata,
    mp3: Mp3Config,
}

impl EncodeTask {
    /// Takes ownership of `buffer`
    pub fn new(buffer: AudioBuffer, seed: FilenameSeed, formats: RequestedFormats) -> Self {
        Self {
            buffer,
            seed,
            formats,
            metadata: TrackMetadata::default(),
            mp3: Mp3Config::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_mp3_config(mut self, mp3: Mp3Config) -> Self {
        self.mp3 = mp3;
        self
    }

    pub fn header(&self) -> BufferHeader {
        self.buffer.header()
    }

    pub fn seed(&self) -> &FilenameSeed {
        &self.seed
    }

    pub fn formats(&self) -> RequestedFormats {
        self.formats
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    /// Encode every requested format; the first failure aborts the task
    pub fn encode(&self) -> EncodeResult {
        if self.formats.is_empty() {
            log::warn!("Encode task for {} requested no formats", self.seed.file_name);
        }

        self.formats
            .iter()
            .map(|format| {
                let payload_bytes = match format {
                    OutputFormat::Wav => WavEncoder.encode(&self.buffer)?,
                    OutputFormat::Mp3 => {
                        let stream = LameMp3Encoder::new(self.mp3).encode(&self.buffer)?;
                        embed_id3(stream, &self.metadata)?
                    }
                };
                Ok(EncodedFile {
                    payload_bytes,
                    file_name: self.seed.file_name(format),
                    format,
                })
            })
            .collect()
    }
}

impl PoolJob for EncodeTask {
    type Output = Vec<EncodedFile>;

    fn run(self) -> OfflineResult<Self::Output> {
        self.encode()
    }
}
