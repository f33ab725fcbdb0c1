//! # Metadata & Lyrics Module
//!
//! Everything the lyric tasks need to know about a single audio file.
//!
//! ## Overview
//!
//! This module handles:
//! - Content-based audio detection and lyric sidecar path derivation ([`classifier`])
//! - Audio tag extraction (ID3, Vorbis, MP4, FLAC, RIFF INFO) ([`extractor`])
//! - The per-execution [`TrackMetadata`](track::TrackMetadata) record ([`track`])
//! - The LRCLib lyrics catalog client ([`lyrics`])

pub mod classifier;
pub mod error;
pub mod extractor;
#[doc(hidden)]
pub mod fixtures;
pub mod lyrics;
pub mod track;

pub use classifier::{is_audio_file, sidecar_paths, SidecarPaths};
pub use error::{MetadataError, Result};
pub use extractor::{AudioTags, MetadataExtractor, TagReader};
pub use lyrics::{
    LrcLibClient, LyricsProvider, LyricsQuery, LyricsRecord, LyricsResult, SearchParams,
};
pub use track::TrackMetadata;
