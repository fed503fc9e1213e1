//! The latest-pointer record format.
//!
//! The appender layer stores, under the reserved key `"default"`, a small
//! JSON record naming the version key most recently appended for an id. The
//! wire form is `{"latestKey":"<key>"}` and it is always written with
//! `gzip = false` so it can be parsed without a decompression step.

use serde::{Deserialize, Serialize};

/// Payload of a latest-pointer record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    /// The version key of the current latest record for the id.
    #[serde(rename = "latestKey")]
    pub latest_key: String,
}

impl Pointer {
    /// Create a pointer naming `latest_key`.
    pub fn new(latest_key: impl Into<String>) -> Self {
        Self {
            latest_key: latest_key.into(),
        }
    }

    /// Serialize to the UTF-8 JSON wire form.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a pointer from stored payload bytes.
    ///
    /// Returns `None` for malformed payloads or an empty `latestKey`; a
    /// corrupt pointer means "no latest version known", never an error.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let pointer: Pointer = serde_json::from_slice(payload).ok()?;
        if pointer.latest_key.is_empty() {
            return None;
        }
        Some(pointer)
    }
}
