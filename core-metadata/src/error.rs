use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Path has no extension: {0}")]
    NoExtension(PathBuf),

    #[error("Failed to extract metadata: {0}")]
    ExtractionFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid lyrics query: {0}")]
    InvalidQuery(String),

    #[error("Invalid duration: {0} (must be a positive number of seconds)")]
    InvalidDuration(i64),

    #[error("Lyrics not found: {0}")]
    LyricsNotFound(String),

    #[error("Lyrics API error ({status}) {name}: {message}")]
    LyricsApi {
        status: u16,
        name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

impl MetadataError {
    /// Input errors the lyrics client rejects before any network call.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            MetadataError::InvalidQuery(_) | MetadataError::InvalidDuration(_)
        )
    }

    /// Errors worth retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MetadataError::LyricsNotFound(_)
                | MetadataError::LyricsApi { .. }
                | MetadataError::Bridge(_)
                | MetadataError::Io(_)
        )
    }

    /// True when the underlying I/O error reports a missing path.
    pub fn is_not_found(&self) -> bool {
        match self {
            MetadataError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            MetadataError::Bridge(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(MetadataError::InvalidQuery("empty".into()).is_invalid_input());
        assert!(MetadataError::InvalidDuration(0).is_invalid_input());
        assert!(!MetadataError::InvalidDuration(0).is_transient());

        assert!(MetadataError::LyricsNotFound("nope".into()).is_transient());
        assert!(MetadataError::LyricsApi {
            status: 503,
            name: "ServiceUnavailable".into(),
            message: "try later".into(),
        }
        .is_transient());

        assert!(!MetadataError::ExtractionFailed("bad tags".into()).is_transient());
    }

    #[test]
    fn test_not_found_detection() {
        let err = MetadataError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(err.is_not_found());
        assert!(!MetadataError::NoExtension(PathBuf::from("/music/a")).is_not_found());
    }
}
