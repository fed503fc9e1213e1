use thiserror::Error;

/// Errors produced by address validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid {field}: {reason}")]
    InvalidSegment { field: &'static str, reason: String },

    #[error("key {0:?} is reserved for latest-pointer records")]
    ReservedKey(String),
}
