use async_trait::async_trait;
use okv_types::{Address, Metadata, Record, ScanEntry};

use crate::error::StoreResult;

/// The backend storage contract.
///
/// All implementations must satisfy these invariants:
/// - At most one live record exists per address; `put` replaces any prior
///   record atomically from the caller's point of view.
/// - An expired record behaves as absent to `get` and `scan`. Physical
///   removal may be lazy (on the next read) or proactive, but logical
///   absence is immediate at the expiry instant.
/// - Absence is never an error: `get` returns `Ok(None)`, `delete` of a
///   missing address is a no-op, `scan` omits dead records.
/// - I/O failures are propagated, never silently ignored.
/// - Concurrent operations on different addresses never interfere.
///   Concurrent writes to the same address race freely; whichever write
///   physically lands last wins.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Store `payload` and `metadata` as the new record at `addr`,
    /// replacing any prior record. The write time is persisted with the
    /// record.
    async fn put(&self, addr: &Address, payload: Vec<u8>, metadata: Metadata) -> StoreResult<()>;

    /// Return the live record at `addr`, or `None` if no record exists or
    /// the stored record has expired. Backends should discard a stale
    /// record found here as a side effect; cleanup failure does not fail
    /// the read.
    async fn get(&self, addr: &Address) -> StoreResult<Option<Record>>;

    /// Remove any record at `addr`. Absence is not an error.
    async fn delete(&self, addr: &Address) -> StoreResult<()>;

    /// Return all live records in `namespace`, optionally narrowed by `id`
    /// and/or `key`. Order is unspecified; expired records are excluded.
    async fn scan(
        &self,
        namespace: &str,
        id: Option<&str>,
        key: Option<&str>,
    ) -> StoreResult<Vec<ScanEntry>>;
}
