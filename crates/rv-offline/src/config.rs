//! Configuration types for offline processing

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, OfflineResult};

/// Hard ceiling on pool units
pub const MAX_WORKERS: usize = 16;

/// Bit rates LAME accepts for CBR
pub const SUPPORTED_MP3_BITRATES: [u32; 8] = [96, 112, 128, 160, 192, 224, 256, 320];

const MIB: usize = 1024 * 1024;

/// Offline processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Number of pool units (0 = auto)
    pub workers: usize,

    /// Streaming decoder settings
    pub decode: DecodeConfig,

    /// MP3 encoder settings
    pub mp3: Mp3Config,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            workers: 0, // Auto-detect
            decode: DecodeConfig::default(),
            mp3: Mp3Config::default(),
        }
    }
}

/// Chunked decode policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Bytes per chunk
    pub chunk_size: usize,
    /// Inputs strictly larger than this are decoded in chunks
    pub chunk_threshold: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            chunk_size: MIB,
            chunk_threshold: 2 * MIB,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mp3Config {
    /// Constant bit rate in kbps
    pub bitrate_kbps: u32,
}

impl Default for Mp3Config {
    fn default() -> Self {
        Self { bitrate_kbps: 320 }
    }
}

impl OfflineConfig {
    /// Read and validate a JSON configuration file
    pub fn load(path: &Path) -> OfflineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| OfflineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OfflineResult<()> {
        if self.decode.chunk_size == 0 {
            return Err(OfflineError::Config("decode.chunk_size must be > 0".into()));
        }
        if self.decode.chunk_threshold == 0 {
            return Err(OfflineError::Config(
                "decode.chunk_threshold must be > 0".into(),
            ));
        }
        if !SUPPORTED_MP3_BITRATES.contains(&self.mp3.bitrate_kbps) {
            return Err(OfflineError::Config(format!(
                "unsupported mp3.bitrate_kbps {} (expected one of {:?})",
                self.mp3.bitrate_kbps, SUPPORTED_MP3_BITRATES
            )));
        }
        Ok(())
    }

    /// Set pool size (0 = auto)
    pub fn with_workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    /// Set chunk size and threshold
    pub fn with_chunking(mut self, chunk_size: usize, chunk_threshold: usize) -> Self {
        self.decode = DecodeConfig {
            chunk_size,
            chunk_threshold,
        };
        self
    }

    pub fn with_mp3_bitrate(mut self, kbps: u32) -> Self {
        self.mp3.bitrate_kbps = kbps;
        self
    }

    /// Effective pool size: auto resolves to the core count, always 1..=16
    pub fn pool_size(&self) -> usize {
        resolve_pool_size(self.workers)
    }
}

pub(crate) fn resolve_pool_size(requested: usize) -> usize {
    let wanted = if requested == 0 {
        num_cpus::get()
    } else {
        requested
    };
    wanted.clamp(1, MAX_WORKERS)
}
