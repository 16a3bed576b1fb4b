//! Common error types for CloudGate.

use thiserror::Error;

/// Top-level error type for CloudGate operations.
///
/// Backend adapters translate every native failure into one of these
/// variants; nothing above the adapter boundary sees a raw SDK or HTTP error.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential fields are missing or invalid for the requested provider.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend rejected the credentials or could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object or resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The user has no credentials registered for the requested provider.
    #[error("Cloud provider not configured: {0}")]
    NoProviderConfigured(String),

    /// Backend refused or failed an upload.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Backend failed while transferring an object.
    #[error("Download failed: {0}")]
    Download(String),

    /// Backend failed to delete an existing object.
    #[error("Delete failed: {0}")]
    Delete(String),

    /// Backend failure outside upload/download/delete (listing, signing).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Caller identity could not be established.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Persistence layer failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error came from resolving or binding a backend
    /// (credentials incomplete or rejected) rather than from an operation.
    pub fn is_binding_failure(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Connection(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("missing secret_access_key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing secret_access_key");

        let err = Error::NoProviderConfigured("aws".to_string());
        assert_eq!(err.to_string(), "Cloud provider not configured: aws");
    }

    #[test]
    fn test_binding_failure() {
        assert!(Error::Config("x".to_string()).is_binding_failure());
        assert!(Error::Connection("x".to_string()).is_binding_failure());
        assert!(!Error::Upload("x".to_string()).is_binding_failure());
        assert!(!Error::NotFound("x".to_string()).is_binding_failure());
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
