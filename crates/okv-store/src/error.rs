use thiserror::Error;

/// Errors from backend storage operations.
///
/// Absence (not found, expired) is not an error; backends report it as
/// `Ok(None)` or by omitting the record from scan results.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from a local storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport or status failure from the remote store.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A stored record cannot be decoded (bad envelope, bad base64,
    /// unparseable metadata).
    #[error("corrupt record at {address}: {reason}")]
    Corrupt { address: String, reason: String },

    /// Envelope serialization failure on write.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;
