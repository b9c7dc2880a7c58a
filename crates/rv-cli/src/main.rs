//! Reverie - slowed / nightcore / reverb exporter
//!
//! Usage:
//!   reverie song.mp3 --preset slowed
//!   reverie a.flac b.wav --speed 0.85 --reverb 0.4 --mp3 --out-dir renders/
//!   reverie song.mp3 --preset nightcore --title "Song" --artist "Me" --cover art.jpg

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use rv_dsp::EffectSettings;
use rv_offline::{
    ExportRequest, Exporter, OfflineConfig, PendingExport, RequestedFormats, TrackMetadata,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// speed 0.8, pitch -1, reverb 0.3, bass 0.1
    Slowed,
    /// speed 1.3, pitch +3, reverb 0.1, bass 0.2
    Nightcore,
}

#[derive(Debug, Parser)]
#[command(name = "reverie", version, about = "Render audio files through the Reverie effect graph")]
struct Cli {
    /// Input audio files (any format symphonia can decode)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for rendered files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Starting point for the effect settings
    #[arg(short, long, value_enum)]
    preset: Option<Preset>,

    /// Playback speed (1.0 = unchanged)
    #[arg(long)]
    speed: Option<f64>,

    /// Pitch in semitones, recorded in the file name
    #[arg(long, allow_hyphen_values = true)]
    pitch: Option<f64>,

    /// Reverb mix, 0..1
    #[arg(long)]
    reverb: Option<f64>,

    /// Bass boost, 0..1
    #[arg(long)]
    bass: Option<f64>,

    /// Underwater low-pass mix, 0..1
    #[arg(long)]
    underwater: Option<f64>,

    /// Write WAV (both formats when neither flag is given)
    #[arg(long)]
    wav: bool,

    /// Write MP3 (both formats when neither flag is given)
    #[arg(long)]
    mp3: bool,

    /// ID3 title for MP3 output
    #[arg(long)]
    title: Option<String>,

    /// ID3 artist for MP3 output
    #[arg(long)]
    artist: Option<String>,

    /// Cover image embedded in MP3 output
    #[arg(long)]
    cover: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Encode units (0 = one per core)
    #[arg(short, long)]
    workers: Option<usize>,
}

impl Cli {
    fn settings(&self) -> EffectSettings {
        let mut settings = match self.preset {
            Some(Preset::Slowed) => EffectSettings::slowed(),
            Some(Preset::Nightcore) => EffectSettings::nightcore(),
            None => EffectSettings::default(),
        };
        if let Some(speed) = self.speed {
            settings = settings.with_speed(speed);
        }
        if let Some(pitch) = self.pitch {
            settings = settings.with_pitch(pitch);
        }
        if let Some(reverb) = self.reverb {
            settings = settings.with_reverb(reverb);
        }
        if let Some(bass) = self.bass {
            settings = settings.with_bass(bass);
        }
        if let Some(underwater) = self.underwater {
            settings = settings.with_underwater(underwater);
        }
        settings
    }

    fn formats(&self) -> RequestedFormats {
        match (self.wav, self.mp3) {
            (false, false) => RequestedFormats::both(),
            (wav, mp3) => RequestedFormats { wav, mp3 },
        }
    }

    fn metadata(&self) -> Result<TrackMetadata> {
        let mut metadata = TrackMetadata::default();
        if let Some(title) = &self.title {
            metadata = metadata.with_title(title.clone());
        }
        if let Some(artist) = &self.artist {
            metadata = metadata.with_artist(artist.clone());
        }
        if let Some(cover) = &self.cover {
            let bytes = fs::read(cover)
                .with_context(|| format!("Failed to read cover image {}", cover.display()))?;
            metadata = metadata.with_cover(bytes);
        }
        Ok(metadata)
    }

    fn config(&self) -> Result<OfflineConfig> {
        let config = match &self.config {
            Some(path) => OfflineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => OfflineConfig::default(),
        };
        Ok(match self.workers {
            Some(workers) => config.with_workers(workers),
            None => config,
        })
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let written = run(&cli)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Export every input; returns the paths written
fn run(cli: &Cli) -> Result<Vec<PathBuf>> {
    let settings = cli.settings();
    let formats = cli.formats();
    let metadata = cli.metadata()?;
    let exporter = Exporter::new(cli.config()?).context("Invalid configuration")?;

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("Failed to create {}", cli.out_dir.display()))?;

    log::info!(
        "Exporting {} file(s) with {} encode units",
        cli.inputs.len(),
        exporter.pool_size()
    );

    // Rendering happens here; encodes queue FIFO on the pool as they arrive
    let mut pending: Vec<(&Path, PendingExport)> = Vec::with_capacity(cli.inputs.len());
    let mut failures = 0usize;
    for input in &cli.inputs {
        match submit_one(&exporter, input, settings, formats, &metadata) {
            Ok(handle) => pending.push((input, handle)),
            Err(err) => {
                log::error!("{:#}", err);
                failures += 1;
            }
        }
    }

    let mut written = Vec::new();
    for (input, handle) in pending {
        let result = handle
            .wait()
            .with_context(|| format!("Failed to encode {}", input.display()));
        let files = match result {
            Ok(files) => files,
            Err(err) => {
                log::error!("{:#}", err);
                failures += 1;
                continue;
            }
        };
        for file in files {
            let path = cli.out_dir.join(&file.file_name);
            fs::write(&path, &file.payload_bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} ({} bytes)", path.display(), file.payload_bytes.len());
            written.push(path);
        }
    }

    let stats = exporter.stats();
    log::debug!("Pool: {} completed, {} failed", stats.completed, stats.failed);

    if failures > 0 {
        bail!("{} of {} input(s) failed", failures, cli.inputs.len());
    }
    Ok(written)
}

fn submit_one(
    exporter: &Exporter,
    input: &Path,
    settings: EffectSettings,
    formats: RequestedFormats,
    metadata: &TrackMetadata,
) -> Result<PendingExport> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let source = exporter
        .decode(&bytes)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let request = ExportRequest::new(file_name, settings)
        .with_formats(formats)
        .with_metadata(metadata.clone());

    exporter
        .submit(&source, request)
        .with_context(|| format!("Failed to render {}", input.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv_offline::{AudioBuffer, AudioEncoder, WavEncoder};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("reverie").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_preset_with_overrides() {
        let cli = parse(&["song.mp3", "--preset", "slowed", "--reverb", "0.5", "--pitch", "-2"]);
        let settings = cli.settings();
        assert_eq!(settings.speed, 0.8);
        assert_eq!(settings.pitch_semitones, -2.0);
        assert_eq!(settings.reverb_mix, 0.5);
        assert_eq!(settings.bass_gain, 0.1);
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(parse(&["a.wav"]).formats(), RequestedFormats::both());
        assert_eq!(parse(&["a.wav", "--mp3"]).formats(), RequestedFormats::mp3_only());
        assert_eq!(parse(&["a.wav", "--wav"]).formats(), RequestedFormats::wav_only());
    }

    #[test]
    fn test_inputs_required() {
        assert!(Cli::try_parse_from(["reverie"]).is_err());
    }

    #[test]
    fn test_batch_export_writes_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = AudioBuffer::silence(8000, 2, 800).unwrap();
        let wav = WavEncoder.encode(&source).unwrap();
        for name in ["one.wav", "two.wav"] {
            fs::write(dir.path().join(name), &wav).unwrap();
        }

        let out = dir.path().join("out");
        let one = dir.path().join("one.wav");
        let two = dir.path().join("two.wav");
        let cli = parse(&[
            one.to_str().unwrap(),
            two.to_str().unwrap(),
            "--wav",
            "--workers",
            "2",
            "--out-dir",
            out.to_str().unwrap(),
        ]);

        let written = run(&cli).unwrap();
        assert_eq!(
            written,
            vec![out.join("one_s1.00_p0.0_r0.wav"), out.join("two_s1.00_p0.0_r0.wav")]
        );
        assert_eq!(fs::read(&written[0]).unwrap(), wav);
    }

    #[test]
    fn test_missing_input_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp3");
        let cli = parse(&[missing.to_str().unwrap(), "--out-dir", dir.path().to_str().unwrap()]);
        assert!(run(&cli).is_err());
    }
}
