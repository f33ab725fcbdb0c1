//! Generated audio files for tests.
//!
//! Builds a minimal PCM WAV image (8 kHz, mono, 8-bit) with an optional RIFF
//! `LIST/INFO` tag chunk, so tests can exercise real tag parsing without
//! shipping binary fixtures.

const SAMPLE_RATE: u32 = 8_000;

/// Tags written into the `INFO` chunk
#[derive(Debug, Clone, Default)]
pub struct WavTags<'a> {
    pub title: Option<&'a str>,
    pub artist: Option<&'a str>,
    pub album: Option<&'a str>,
}

impl<'a> WavTags<'a> {
    pub fn new(title: &'a str, artist: &'a str, album: &'a str) -> Self {
        Self {
            title: Some(title),
            artist: Some(artist),
            album: Some(album),
        }
    }
}

/// A WAV file image of `seconds` length carrying `tags`.
pub fn tagged_wav(tags: &WavTags<'_>, seconds: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"WAVE");

    let mut fmt = Vec::with_capacity(16);
    fmt.extend_from_slice(&1u16.to_le_bytes()); // PCM
    fmt.extend_from_slice(&1u16.to_le_bytes()); // mono
    fmt.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    fmt.extend_from_slice(&SAMPLE_RATE.to_le_bytes()); // byte rate
    fmt.extend_from_slice(&1u16.to_le_bytes()); // block align
    fmt.extend_from_slice(&8u16.to_le_bytes()); // bits per sample
    push_chunk(&mut body, b"fmt ", &fmt);

    let mut info = Vec::new();
    for (id, value) in [
        (b"INAM", tags.title),
        (b"IART", tags.artist),
        (b"IPRD", tags.album),
    ] {
        if let Some(value) = value {
            let mut text = value.as_bytes().to_vec();
            text.push(0);
            push_chunk(&mut info, id, &text);
        }
    }
    if !info.is_empty() {
        let mut list = b"INFO".to_vec();
        list.extend_from_slice(&info);
        push_chunk(&mut body, b"LIST", &list);
    }

    let samples = vec![0x80u8; (SAMPLE_RATE * seconds) as usize];
    push_chunk(&mut body, b"data", &samples);

    let mut file = Vec::with_capacity(body.len() + 8);
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(body.len() as u32).to_le_bytes());
    file.extend_from_slice(&body);
    file
}

fn push_chunk(out: &mut Vec<u8>, id: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(id);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}
