use okv_store::StoreError;
use okv_types::AddressError;
use thiserror::Error;

/// Errors from controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Malformed namespace, id, or key; rejected before any backend call.
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    /// Compression or decompression failure. Corrupt compressed data
    /// surfaces here, never as silently returned raw bytes.
    #[error("codec error: {0}")]
    Codec(#[source] std::io::Error),

    /// Latest-pointer serialization failure.
    #[error("pointer serialization error: {0}")]
    Pointer(#[from] serde_json::Error),

    /// Failure propagated from the underlying backend.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;
