//! Export orchestration
//!
//! Ties the stages together: decode bytes, render with a settings snapshot,
//! hand the rendered buffer to the pool for encoding. Every call takes the
//! state it needs as arguments and returns its result.

use rv_dsp::EffectSettings;

use crate::buffer::AudioBuffer;
use crate::config::OfflineConfig;
use crate::decoder::StreamingDecoder;
use crate::error::OfflineResult;
use crate::formats::RequestedFormats;
use crate::job::{EncodeTask, EncodedFile, FilenameSeed};
use crate::pool::{PendingResult, PoolStats, PoolWorker, WorkerPool};
use crate::render::OfflineRenderer;
use crate::tags::TrackMetadata;

/// Everything one export needs, captured at request time
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub file_name: String,
    pub settings: EffectSettings,
    pub formats: RequestedFormats,
    pub metadata: TrackMetadata,
}

impl ExportRequest {
    pub fn new(file_name: impl Into<String>, settings: EffectSettings) -> Self {
        Self {
            file_name: file_name.into(),
            settings,
            formats: RequestedFormats::both(),
            metadata: TrackMetadata::default(),
        }
    }

    pub fn with_formats(mut self, formats: RequestedFormats) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Pending encode of one export
pub type PendingExport = PendingResult<Vec<EncodedFile>>;

/// Decode → render → pooled encode
pub struct Exporter {
    config: OfflineConfig,
    decoder: StreamingDecoder,
    pool: WorkerPool<EncodeTask>,
}

impl Exporter {
    pub fn new(config: OfflineConfig) -> OfflineResult<Self> {
        config.validate()?;
        Ok(Self {
            decoder: StreamingDecoder::new(config.decode),
            pool: WorkerPool::new(config.workers),
            config,
        })
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Decode encoded bytes, chunked when large
    pub fn decode(&self, bytes: &[u8]) -> OfflineResult<AudioBuffer> {
        self.decoder.decode(bytes)
    }

    /// Render `source` with `settings` on the calling thread
    pub fn render(&self, source: &AudioBuffer, settings: &EffectSettings) -> OfflineResult<AudioBuffer> {
        OfflineRenderer::render(source, settings)
    }

    /// Render, then queue the encode. Render failures return here; encode
    /// and pool failures arrive through the handle.
    pub fn submit(&self, source: &AudioBuffer, request: ExportRequest) -> OfflineResult<PendingExport> {
        let rendered = self.render(source, &request.settings)?;
        let seed = FilenameSeed::new(request.file_name, &request.settings);
        let task = EncodeTask::new(rendered, seed, request.formats)
            .with_metadata(request.metadata)
            .with_mp3_config(self.config.mp3);
        Ok(self.pool.submit(task))
    }

    /// `submit` and wait
    pub fn export(&self, source: &AudioBuffer, request: ExportRequest) -> OfflineResult<Vec<EncodedFile>> {
        let file_name = request.file_name.clone();
        let files = self.submit(source, request)?.wait()?;
        log::info!("Exported {} ({} files)", file_name, files.len());
        Ok(files)
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    pub fn workers(&self) -> Vec<PoolWorker> {
        self.pool.workers()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OfflineError;

    #[test]
    fn test_invalid_config_rejected() {
        let config = OfflineConfig::default().with_chunking(0, 0);
        assert!(matches!(Exporter::new(config), Err(OfflineError::Config(_))));
    }

    #[test]
    fn test_render_failure_surfaces_directly() {
        let exporter = Exporter::new(OfflineConfig::default().with_workers(1)).unwrap();
        let empty = AudioBuffer::silence(44100, 2, 0).unwrap();
        let err = exporter
            .submit(&empty, ExportRequest::new("a.wav", EffectSettings::default()))
            .unwrap_err();
        assert!(matches!(err, OfflineError::Render(_)));
        assert_eq!(exporter.stats(), PoolStats::default());
    }

    #[test]
    fn test_wav_export_names_and_sizes() {
        let exporter = Exporter::new(OfflineConfig::default().with_workers(2)).unwrap();
        let source = AudioBuffer::silence(8000, 2, 8000).unwrap();
        let request = ExportRequest::new("clip.ogg", EffectSettings::default())
            .with_formats(RequestedFormats::wav_only());

        let files = exporter.export(&source, request).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "clip_s1.00_p0.0_r0.wav");
        assert_eq!(files[0].payload_bytes.len(), 44 + 2 * 8000 * 4);
    }
}
