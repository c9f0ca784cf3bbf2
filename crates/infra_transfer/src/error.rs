//! Transfer infrastructure errors

use thiserror::Error;

use domain_accumulation::TransferError;

/// Errors raised by key handling and envelope encryption
///
/// Messages never include key bytes or passphrases.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Key import failed: {0}")]
    KeyImport(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

impl From<CryptoError> for TransferError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyImport(msg) => TransferError::KeyImport(msg),
            CryptoError::Decryption(msg) => TransferError::Decryption(msg),
            CryptoError::Encryption(msg) => TransferError::KeyImport(msg),
        }
    }
}

/// Errors raised by file stores
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection refused, reset or otherwise interrupted
    #[error("Connection error: {0}")]
    Connection(String),

    /// Remote 5xx
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Remote 409, or 429 throttling
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote refused the request for another reason
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Returns true if the error may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_)
                | StoreError::Server { .. }
                | StoreError::Conflict(_)
                | StoreError::Timeout { .. }
        )
    }

    /// Maps an HTTP status and body onto a store error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => StoreError::Unauthorized(message),
            404 => StoreError::NotFound(message),
            409 | 429 => StoreError::Conflict(message),
            500..=599 => StoreError::Server { status, message },
            _ => StoreError::Rejected { status, message },
        }
    }

    /// Converts into the domain error once retries are exhausted
    pub fn into_transfer_error(self, attempts: u32) -> TransferError {
        match self {
            StoreError::Unauthorized(msg) => TransferError::Unauthorized(msg),
            StoreError::NotFound(msg) => TransferError::NotFound(msg),
            StoreError::Timeout { operation, duration_ms } if attempts <= 1 => {
                TransferError::Timeout { operation, duration_ms }
            }
            other => TransferError::TransferFailure {
                attempts,
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => StoreError::NotFound(err.to_string()),
            ErrorKind::PermissionDenied => StoreError::Unauthorized(err.to_string()),
            ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected => StoreError::Connection(err.to_string()),
            _ => StoreError::Io(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout {
                operation: "http request".to_string(),
                duration_ms: 0,
            }
        } else if let Some(status) = err.status() {
            StoreError::from_status(status.as_u16(), err.to_string())
        } else {
            StoreError::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(StoreError::from_status(503, "busy").is_transient());
        assert!(StoreError::from_status(409, "locked").is_transient());
        assert!(!StoreError::from_status(401, "denied").is_transient());
        assert!(!StoreError::from_status(404, "gone").is_transient());
        assert!(!StoreError::from_status(400, "bad").is_transient());
    }

    #[test]
    fn test_io_classification() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(StoreError::from(reset).is_transient());
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(StoreError::from(missing), StoreError::NotFound(_)));
    }

    #[test]
    fn test_into_transfer_error() {
        let exhausted = StoreError::Server { status: 502, message: "bad gateway".into() }.into_transfer_error(3);
        assert!(matches!(exhausted, TransferError::TransferFailure { attempts: 3, .. }));
        let denied = StoreError::Unauthorized("no".into()).into_transfer_error(1);
        assert!(matches!(denied, TransferError::Unauthorized(_)));
    }
}
