//! Audio decoding
//!
//! [`SymphoniaDecoder`] turns encoded bytes into an [`AudioBuffer`].
//! [`StreamingDecoder`] wraps any backend: large inputs are cut into fixed
//! byte chunks that decode in parallel and are merged in chunk order.
//!
//! Chunk boundaries are raw byte offsets, not frame aligned. A chunk that
//! fails to decode sends the whole input back through a single decode.
//! Seams between chunks that do decode are kept as they come out.

use std::io::Cursor;

use rayon::prelude::*;
use symphonia::core::audio::{AudioBuffer as SymphoniaBuffer, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::buffer::AudioBuffer;
use crate::config::DecodeConfig;
use crate::error::{OfflineError, OfflineResult};

// ═══════════════════════════════════════════════════════════════════════════════
// DECODE BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

/// Something that decodes one self-contained byte run
pub trait DecodeBackend: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> OfflineResult<AudioBuffer>;
}

/// Universal audio decoder using symphonia
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl DecodeBackend for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> OfflineResult<AudioBuffer> {
        let source = Cursor::new(bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        // Probe format
        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| OfflineError::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| OfflineError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let mut sample_rate = codec_params.sample_rate;
        let mut channel_count = codec_params.channels.map(|c| c.count());

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| OfflineError::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut scratch: Option<SymphoniaBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(OfflineError::Decode(format!("Packet read error: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Skip corrupt frames
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(OfflineError::Decode(format!("Decode error: {}", e))),
            };

            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            let count = *channel_count.get_or_insert(spec.channels.count());
            if channels.is_empty() {
                channels = vec![Vec::new(); count];
            }

            let needs_new = scratch
                .as_ref()
                .is_none_or(|buf| buf.capacity() < decoded.capacity() || *buf.spec() != spec);
            if needs_new {
                scratch = Some(decoded.make_equivalent::<f32>());
            }
            let Some(buf) = scratch.as_mut() else {
                continue;
            };
            decoded.convert(buf);

            for (ch, channel) in channels.iter_mut().enumerate() {
                if ch < buf.spec().channels.count() {
                    channel.extend_from_slice(buf.chan(ch));
                } else {
                    channel.resize(channel.len() + buf.frames(), 0.0);
                }
            }
        }

        let sample_rate =
            sample_rate.ok_or_else(|| OfflineError::Decode("Unknown sample rate".to_string()))?;
        if channels.is_empty() {
            channels = vec![Vec::new(); channel_count.unwrap_or(1).max(1)];
        }

        AudioBuffer::new(sample_rate, channels).map_err(|e| OfflineError::Decode(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STREAMING DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Chunked, parallel decoder for large inputs
pub struct StreamingDecoder<B: DecodeBackend = SymphoniaDecoder> {
    backend: B,
    config: DecodeConfig,
}

impl StreamingDecoder<SymphoniaDecoder> {
    pub fn new(config: DecodeConfig) -> Self {
        Self::with_backend(SymphoniaDecoder, config)
    }
}

impl<B: DecodeBackend> StreamingDecoder<B> {
    pub fn with_backend(backend: B, config: DecodeConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether `len` bytes take the chunked path
    pub fn is_chunked(&self, len: usize) -> bool {
        len > self.config.chunk_threshold
    }

    /// Decode `bytes` into one contiguous buffer
    pub fn decode(&self, bytes: &[u8]) -> OfflineResult<AudioBuffer> {
        if !self.is_chunked(bytes.len()) {
            return self.backend.decode(bytes);
        }

        let chunk_size = self.config.chunk_size.max(1);
        log::debug!(
            "Decoding {} bytes in {} chunks of {} bytes",
            bytes.len(),
            bytes.len().div_ceil(chunk_size),
            chunk_size
        );

        // Every chunk runs at once; ordered collect keeps chunk order
        let decoded: OfflineResult<Vec<AudioBuffer>> = bytes
            .par_chunks(chunk_size)
            .map(|chunk| self.backend.decode(chunk))
            .collect();

        match decoded {
            Ok(parts) => merge_chunks(parts),
            Err(err) => {
                log::warn!("Chunked decode failed ({}), falling back to a single decode", err);
                self.backend.decode(bytes)
            }
        }
    }
}

/// Concatenate decoded chunks in order.
///
/// Sample rate and channel layout come from the first chunk. A later chunk
/// with fewer channels is padded with silence, extra channels are dropped,
/// so every channel grows by that chunk's frame count.
pub fn merge_chunks(parts: Vec<AudioBuffer>) -> OfflineResult<AudioBuffer> {
    let mut parts = parts.into_iter();
    let first = parts
        .next()
        .ok_or_else(|| OfflineError::Decode("no chunks to merge".into()))?;

    let sample_rate = first.sample_rate();
    let mut channels = first.into_channels();

    for part in parts {
        let frames = part.frame_count();
        let mut sources = part.into_channels().into_iter();
        for channel in channels.iter_mut() {
            match sources.next() {
                Some(source) => channel.extend(source),
                None => channel.resize(channel.len() + frames, 0.0),
            }
        }
    }

    AudioBuffer::new(sample_rate, channels)
}
