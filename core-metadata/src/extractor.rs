//! Audio Tag Extraction
//!
//! Reads title, artist, album and duration from audio files using the `lofty`
//! crate. Supports ID3v2, Vorbis Comments, MP4 tags, RIFF INFO, APE and FLAC.
//!
//! ## Overview
//!
//! - The file is read through [`FileSystemAccess`] and probed by content, so a
//!   misnamed file is still parsed according to what it actually holds.
//! - Text fields are whitespace-normalized; empty values become `None`.
//! - When the track artist is missing the album artist is used instead.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::extractor::{MetadataExtractor, TagReader};
//! use std::path::Path;
//!
//! # async fn example(fs: Arc<dyn FileSystemAccess>) -> core_metadata::Result<()> {
//! let extractor = MetadataExtractor::new(fs);
//! let tags = extractor.read_tags(Path::new("song.flac")).await?;
//!
//! println!("Title: {}", tags.title.unwrap_or_default());
//! println!("Duration: {:?}", tags.duration);
//! # Ok(())
//! # }
//! ```

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};

/// Tags read from an audio file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioTags {
    /// Track title (normalized)
    pub title: Option<String>,
    /// Track artist, or the album artist when the track has none
    pub artist: Option<String>,
    /// Album name (normalized)
    pub album: Option<String>,
    /// Album artist (normalized)
    pub album_artist: Option<String>,
    /// Playback length from the audio properties
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// MIME type of the detected container
    pub mime_type: String,
}

/// Source of audio tags for a path
///
/// The sync task depends on this trait rather than on lofty directly so tests
/// can substitute canned tags.
#[async_trait]
pub trait TagReader: Send + Sync {
    /// Read the tags of the audio file at `path`
    ///
    /// # Errors
    ///
    /// - [`MetadataError::Bridge`] if the file cannot be read
    /// - [`MetadataError::UnsupportedFormat`] if the container is not recognized
    /// - [`MetadataError::ExtractionFailed`] if the container is corrupt
    async fn read_tags(&self, path: &Path) -> Result<AudioTags>;
}

/// Audio metadata extractor backed by `lofty`
pub struct MetadataExtractor {
    fs: Arc<dyn FileSystemAccess>,
    parse_options: ParseOptions,
}

impl MetadataExtractor {
    /// Create a new metadata extractor with default parse options
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            fs,
            parse_options: ParseOptions::new(),
        }
    }

    /// Parse tags out of an in-memory file image
    pub fn extract_from_bytes(&self, data: &[u8]) -> Result<AudioTags> {
        let probe = Probe::new(Cursor::new(data))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e)))?;

        if probe.file_type().is_none() {
            return Err(MetadataError::UnsupportedFormat(
                "unrecognized audio container".to_string(),
            ));
        }

        let tagged_file = probe
            .read()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {}", e)))?;

        let mime_type = Self::file_type_to_mime_type(tagged_file.file_type());
        let duration = tagged_file.properties().duration();

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        let Some(tag) = tag else {
            return Ok(AudioTags {
                duration,
                mime_type,
                ..AudioTags::default()
            });
        };

        let title = tag.title().and_then(|s| Self::non_empty(s.as_ref()));
        let album = tag.album().and_then(|s| Self::non_empty(s.as_ref()));
        let album_artist = tag
            .get_string(&ItemKey::AlbumArtist)
            .and_then(Self::non_empty);
        let artist = tag
            .artist()
            .and_then(|s| Self::non_empty(s.as_ref()))
            .or_else(|| album_artist.clone());

        Ok(AudioTags {
            title,
            artist,
            album,
            album_artist,
            duration,
            mime_type,
        })
    }

    /// Normalize text metadata
    ///
    /// - Trims leading/trailing whitespace
    /// - Normalizes consecutive whitespace to single space
    /// - Removes null bytes and control characters
    fn normalize_text(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .filter(|c| !c.is_control())
            .collect()
    }

    fn non_empty(text: &str) -> Option<String> {
        let normalized = Self::normalize_text(text);
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }

    /// Convert lofty FileType to MIME type string
    fn file_type_to_mime_type(file_type: FileType) -> String {
        match file_type {
            FileType::Aac => "audio/aac",
            FileType::Aiff => "audio/aiff",
            FileType::Ape => "audio/ape",
            FileType::Flac => "audio/flac",
            FileType::Mpeg => "audio/mpeg",
            FileType::Mp4 => "audio/mp4",
            FileType::Mpc => "audio/musepack",
            FileType::Opus => "audio/opus",
            FileType::Vorbis => "audio/vorbis",
            FileType::Speex => "audio/speex",
            FileType::Wav => "audio/wav",
            FileType::WavPack => "audio/wavpack",
            _ => "application/octet-stream",
        }
        .to_string()
    }
}

#[async_trait]
impl TagReader for MetadataExtractor {
    async fn read_tags(&self, path: &Path) -> Result<AudioTags> {
        debug!(path = %path.display(), "Extracting metadata");

        let data = self.fs.read_file(path).await?;
        let tags = self.extract_from_bytes(&data).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "Metadata extraction failed");
        })?;

        if tags.title.is_none() && tags.artist.is_none() {
            debug!(path = %path.display(), "No usable tags found");
        }

        Ok(tags)
    }
}

mod duration_secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            MetadataExtractor::normalize_text("  Hello   World  "),
            "Hello World"
        );
        assert_eq!(
            MetadataExtractor::normalize_text("Title\nWith\tWhitespace"),
            "Title With Whitespace"
        );
        assert_eq!(MetadataExtractor::normalize_text("Name\0"), "Name");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(MetadataExtractor::non_empty("   "), None);
        assert_eq!(MetadataExtractor::non_empty("\0"), None);
        assert_eq!(
            MetadataExtractor::non_empty(" Song "),
            Some("Song".to_string())
        );
    }

    #[test]
    fn test_file_type_to_mime_type() {
        assert_eq!(
            MetadataExtractor::file_type_to_mime_type(FileType::Mpeg),
            "audio/mpeg"
        );
        assert_eq!(
            MetadataExtractor::file_type_to_mime_type(FileType::Flac),
            "audio/flac"
        );
        assert_eq!(
            MetadataExtractor::file_type_to_mime_type(FileType::Wav),
            "audio/wav"
        );
    }

    #[test]
    fn test_audio_tags_serde_uses_seconds() {
        let tags = AudioTags {
            title: Some("X".to_string()),
            duration: Duration::from_millis(1500),
            mime_type: "audio/flac".to_string(),
            ..AudioTags::default()
        };

        let json = serde_json::to_value(&tags).unwrap();
        assert_eq!(json["duration"], 1.5);

        let back: AudioTags = serde_json::from_value(json).unwrap();
        assert_eq!(back, tags);
    }
}
