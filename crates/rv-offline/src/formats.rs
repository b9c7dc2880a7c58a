//! Output format definitions

use serde::{Deserialize, Serialize};

/// Container written for one encode output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 32-bit float RIFF/WAVE
    Wav,
    /// MPEG-1 Layer III, optionally ID3v2 tagged
    Mp3,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

/// Which formats a task produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestedFormats {
    pub wav: bool,
    pub mp3: bool,
}

impl RequestedFormats {
    pub fn both() -> Self {
        Self { wav: true, mp3: true }
    }

    pub fn wav_only() -> Self {
        Self { wav: true, mp3: false }
    }

    pub fn mp3_only() -> Self {
        Self { wav: false, mp3: true }
    }

    pub fn is_empty(&self) -> bool {
        !self.wav && !self.mp3
    }

    /// Requested formats in output order (WAV first)
    pub fn iter(&self) -> impl Iterator<Item = OutputFormat> + use<> {
        let wav = self.wav.then_some(OutputFormat::Wav);
        let mp3 = self.mp3.then_some(OutputFormat::Mp3);
        wav.into_iter().chain(mp3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_order() {
        let formats: Vec<_> = RequestedFormats::both().iter().collect();
        assert_eq!(formats, vec![OutputFormat::Wav, OutputFormat::Mp3]);
        assert_eq!(RequestedFormats::default().iter().count(), 0);
        assert!(RequestedFormats::default().is_empty());
    }

    #[test]
    fn test_serde_shape() {
        let formats: RequestedFormats = serde_json::from_str(r#"{"mp3":true}"#).unwrap();
        assert_eq!(formats, RequestedFormats::mp3_only());
        assert_eq!(serde_json::to_string(&OutputFormat::Wav).unwrap(), r#""wav""#);
    }
}
