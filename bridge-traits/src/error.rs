use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns the underlying I/O error kind, if this error wraps one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            BridgeError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// True when the error reports a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(std::io::ErrorKind::NotFound)
    }

    /// True when a create-new write hit an existing file.
    pub fn is_already_exists(&self) -> bool {
        self.io_kind() == Some(std::io::ErrorKind::AlreadyExists)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_kind_helpers() {
        let not_found = BridgeError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(not_found.is_not_found());
        assert!(!not_found.is_already_exists());

        let exists = BridgeError::from(io::Error::new(io::ErrorKind::AlreadyExists, "there"));
        assert!(exists.is_already_exists());

        let other = BridgeError::OperationFailed("boom".to_string());
        assert_eq!(other.io_kind(), None);
    }
}
