//! Path classification for the watch pipeline.
//!
//! Decides whether a path is an audio file by sniffing its leading bytes with
//! `infer`, and derives the lyric sidecar paths that sit next to it.
//!
//! Content sniffing is authoritative: a misnamed `song.txt` holding FLAC data
//! is audio, and a `song.mp3` holding text is not. The extension allow-list in
//! [`has_audio_extension`] is only used for paths that no longer exist and
//! therefore cannot be sniffed.

use std::path::{Path, PathBuf};

use bridge_traits::storage::FileSystemAccess;
use infer::MatcherType;

use crate::error::{MetadataError, Result};

/// Bytes read from the head of a file for content sniffing.
pub const SNIFF_LEN: usize = 8192;

/// Sidecar extension for plain lyrics.
pub const PLAIN_LYRICS_EXTENSION: &str = "txt";

/// Sidecar extension for synchronized lyrics.
pub const SYNCED_LYRICS_EXTENSION: &str = "lrc";

const AUDIO_EXTENSIONS: &[&str] = &[
    "aac", "aif", "aiff", "alac", "amr", "ape", "dsf", "flac", "m4a", "m4b", "mka", "mp2", "mp3",
    "mpc", "oga", "ogg", "opus", "spx", "wav", "wma", "wv",
];

/// The two lyric sidecar paths belonging to an audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarPaths {
    /// `<basename>.txt`
    pub plain: PathBuf,
    /// `<basename>.lrc`
    pub synced: PathBuf,
}

/// Returns `true` when `path` is a regular file whose content is audio.
///
/// Directories and non-audio files yield `Ok(false)`. Errors are reserved for
/// I/O failures such as a missing or unreadable path.
pub async fn is_audio_file(fs: &dyn FileSystemAccess, path: &Path) -> Result<bool> {
    let metadata = fs.metadata(path).await?;
    if !metadata.is_file {
        return Ok(false);
    }

    let head = fs.read_head(path, SNIFF_LEN).await?;
    Ok(is_audio_bytes(&head))
}

/// Content check on an already-read buffer.
pub fn is_audio_bytes(buf: &[u8]) -> bool {
    infer::get(buf)
        .map(|kind| kind.matcher_type() == MatcherType::Audio)
        .unwrap_or(false)
}

/// MIME type sniffed from `buf`, if recognized.
pub fn sniff_mime_type(buf: &[u8]) -> Option<&'static str> {
    infer::get(buf).map(|kind| kind.mime_type())
}

/// Derives the plain and synced lyric paths for `audio_path`.
///
/// # Errors
///
/// [`MetadataError::NoExtension`] when the path has no extension segment.
pub fn sidecar_paths(audio_path: &Path) -> Result<SidecarPaths> {
    if audio_path.extension().is_none() {
        return Err(MetadataError::NoExtension(audio_path.to_path_buf()));
    }

    Ok(SidecarPaths {
        plain: audio_path.with_extension(PLAIN_LYRICS_EXTENSION),
        synced: audio_path.with_extension(SYNCED_LYRICS_EXTENSION),
    })
}

/// True when the extension is one of the lyric sidecar extensions.
pub fn is_sidecar_path(path: &Path) -> bool {
    extension_lowercase(path)
        .map(|ext| ext == PLAIN_LYRICS_EXTENSION || ext == SYNCED_LYRICS_EXTENSION)
        .unwrap_or(false)
}

/// Extension-based audio check for paths that can no longer be read.
pub fn has_audio_extension(path: &Path) -> bool {
    extension_lowercase(path)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
