//! ID3v2 metadata embedding for MP3 output

use lofty::config::WriteOptions;
use lofty::id3::v2::Id3v2Tag;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::{Accessor, TagExt};
use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, OfflineResult};

/// Picture description written with the cover frame
pub const COVER_DESCRIPTION: &str = "Cover";

/// Optional track metadata; empty strings and empty covers count as absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub cover_bytes: Option<Vec<u8>>,
}

impl TrackMetadata {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_cover(mut self, cover: Vec<u8>) -> Self {
        self.cover_bytes = Some(cover);
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|s| !s.is_empty())
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref().filter(|s| !s.is_empty())
    }

    pub fn cover(&self) -> Option<&[u8]> {
        self.cover_bytes.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.title().is_none() && self.artist().is_none() && self.cover().is_none()
    }
}

/// Guess a picture MIME type from magic bytes
pub fn sniff_image_mime(data: &[u8]) -> Option<MimeType> {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => Some(MimeType::Jpeg),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(MimeType::Png),
        [b'G', b'I', b'F', b'8', ..] => Some(MimeType::Gif),
        [b'B', b'M', ..] => Some(MimeType::Bmp),
        _ => None,
    }
}

/// Prefix `mp3` with an ID3v2 tag holding the present metadata.
///
/// With no metadata the stream is returned untouched.
pub fn embed_id3(mp3: Vec<u8>, metadata: &TrackMetadata) -> OfflineResult<Vec<u8>> {
    if metadata.is_empty() {
        return Ok(mp3);
    }

    let mut tag = Id3v2Tag::new();
    if let Some(title) = metadata.title() {
        tag.set_title(title.to_string());
    }
    if let Some(artist) = metadata.artist() {
        tag.set_artist(artist.to_string());
    }
    if let Some(cover) = metadata.cover() {
        let picture = Picture::new_unchecked(
            PictureType::CoverFront,
            sniff_image_mime(cover),
            Some(COVER_DESCRIPTION.into()),
            cover.to_vec(),
        );
        tag.insert_picture(picture);
    }

    let mut output = Vec::with_capacity(mp3.len() + metadata.cover().map_or(0, <[u8]>::len) + 1024);
    tag.dump_to(&mut output, WriteOptions::default())
        .map_err(|e| OfflineError::Encode(format!("ID3v2 write failed: {}", e)))?;
    let tag_len = output.len();
    output.extend_from_slice(&mp3);

    log::debug!("Embedded {} byte ID3v2 tag", tag_len);
    Ok(output)
}
