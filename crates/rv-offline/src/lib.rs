//! rv-offline: Offline render and export pipeline for Reverie
//!
//! Turns encoded audio into effected, encoded deliverables:
//! - Streaming decode of large inputs (parallel byte chunks, ordered merge)
//! - Offline rendering through a fresh effect graph
//! - A bounded pool of encode units with FIFO queueing
//! - WAV (32-bit float) and MP3 (LAME, 320 kbps) encoding with ID3v2 tags
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Exporter                                 │
//! │                                                                       │
//! │  ┌──────────────┐   ┌────────────────┐   ┌─────────────────────────┐ │
//! │  │ Streaming    │ → │ OfflineRenderer│ → │ WorkerPool<EncodeTask>  │ │
//! │  │ Decoder      │   │ (rv-dsp graph) │   │  WAV / MP3 / ID3 per    │ │
//! │  │ (rayon)      │   │                │   │  unit, FIFO queue       │ │
//! │  └──────────────┘   └────────────────┘   └─────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rv_offline::{Exporter, ExportRequest, OfflineConfig};
//! use rv_dsp::EffectSettings;
//!
//! let exporter = Exporter::new(OfflineConfig::default())?;
//! let source = exporter.decode(&std::fs::read("song.mp3")?)?;
//! let files = exporter.export(&source, ExportRequest::new("song.mp3", EffectSettings::slowed()))?;
//! ```

mod buffer;
mod config;
mod decoder;
mod encoder;
mod error;
mod formats;
mod job;
mod pipeline;
mod pool;
mod render;
mod tags;

pub use buffer::*;
pub use config::*;
pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use formats::*;
pub use job::*;
pub use pipeline::*;
pub use pool::*;
pub use render::*;
pub use tags::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
