//! Records and the metadata that drives controller-layer policy.
//!
//! A [`Record`] is what a backend hands back from `get`/`scan`: the payload
//! bytes exactly as stored (possibly gzip-compressed), the caller-supplied
//! [`Metadata`], and the write timestamp. Liveness is a pure function of the
//! metadata TTL and the write timestamp; every backend applies the same rule.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Per-record policy metadata, carried alongside every payload.
///
/// One canonical typed form is used by all controllers; each backend owns the
/// conversion to its native representation (JSON integers on disk, decimal
/// strings on the remote store) at its own boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Time-to-live. A record is live while `now < stored_at + ttl`; absent
    /// means the record never expires.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "ttl_millis"
    )]
    pub ttl: Option<Duration>,

    /// Advisory MIME type of the (uncompressed) payload.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,

    /// Whether the stored payload bytes are gzip-compressed. Stored as-is so
    /// the reverse transform is self-describing.
    #[serde(default)]
    pub gzip: bool,
}

/// Serde adapter storing the TTL as integer milliseconds.
mod ttl_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        ttl.map(|d| d.as_millis() as u64).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(de)?.map(Duration::from_millis))
    }
}

/// A stored record: payload bytes as the backend persisted them, the metadata
/// they were written with, and the write time.
///
/// Backends own their records; upper layers never retain one past a single
/// call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Raw stored bytes (gzip-compressed when `metadata.gzip` is set).
    pub payload: Vec<u8>,
    /// Metadata the record was written with.
    pub metadata: Metadata,
    /// Wall-clock write time. Informational only; never used to resolve
    /// write conflicts.
    pub stored_at: SystemTime,
}

impl Record {
    /// Create a record stamped with the current wall-clock time.
    pub fn new(payload: Vec<u8>, metadata: Metadata) -> Self {
        Self {
            payload,
            metadata,
            stored_at: SystemTime::now(),
        }
    }

    /// Returns `true` if this record is live at `now`: the TTL is absent, or
    /// `now < stored_at + ttl`.
    pub fn is_live(&self, now: SystemTime) -> bool {
        match self.metadata.ttl {
            None => true,
            Some(ttl) => now < self.stored_at + ttl,
        }
    }

    /// Returns `true` if this record has expired at `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        !self.is_live(now)
    }
}

/// One scan hit: the address a live record was found at, plus the record.
///
/// Scan results carry raw stored bytes; compressed payloads are not
/// decompressed by any layer.
#[derive(Clone, Debug)]
pub struct ScanEntry {
    pub address: Address,
    pub record: Record,
}

/// Milliseconds since the Unix epoch for `t`, saturating at zero for
/// pre-epoch times.
pub fn epoch_ms(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The `SystemTime` for a millisecond epoch timestamp.
pub fn from_epoch_ms(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Liveness
    // -----------------------------------------------------------------------

    #[test]
    fn record_without_ttl_never_expires() {
        let record = Record::new(b"data".to_vec(), Metadata::default());
        let far_future = record.stored_at + Duration::from_secs(100 * 365 * 24 * 3600);
        assert!(record.is_live(far_future));
    }

    #[test]
    fn ttl_boundary_is_exclusive() {
        let record = Record::new(
            b"data".to_vec(),
            Metadata {
                ttl: Some(Duration::from_millis(1000)),
                ..Metadata::default()
            },
        );
        let just_before = record.stored_at + Duration::from_millis(999);
        let at_boundary = record.stored_at + Duration::from_millis(1000);
        assert!(record.is_live(just_before));
        assert!(record.is_expired(at_boundary));
    }

    // -----------------------------------------------------------------------
    // Metadata serialization
    // -----------------------------------------------------------------------

    #[test]
    fn metadata_serializes_ttl_as_millis() {
        let meta = Metadata {
            ttl: Some(Duration::from_secs(5)),
            mime_type: Some("text/plain".into()),
            gzip: true,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["ttl"], 5000);
        assert_eq!(json["mimeType"], "text/plain");
        assert_eq!(json["gzip"], true);
    }

    #[test]
    fn metadata_omits_absent_fields() {
        let json = serde_json::to_string(&Metadata::default()).unwrap();
        assert!(!json.contains("ttl"));
        assert!(!json.contains("mimeType"));
        assert!(json.contains("\"gzip\":false"));
    }

    #[test]
    fn metadata_round_trips() {
        let meta = Metadata {
            ttl: Some(Duration::from_millis(250)),
            mime_type: None,
            gzip: false,
        };
        let back: Metadata = serde_json::from_str(&serde_json::to_string(&meta).unwrap()).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn metadata_defaults_from_empty_object() {
        let meta: Metadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, Metadata::default());
    }

    // -----------------------------------------------------------------------
    // Epoch conversions
    // -----------------------------------------------------------------------

    #[test]
    fn epoch_ms_round_trips() {
        let t = from_epoch_ms(1_700_000_000_123);
        assert_eq!(epoch_ms(t), 1_700_000_000_123);
    }
}
