//! In-memory backend for tests, embedding, and ephemeral caches.
//!
//! Records live in a `HashMap` keyed by the composite `namespace:id:key`
//! string, behind a `RwLock` shared with per-address TTL reaper tasks. Data
//! is lost when the backend is dropped.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use async_trait::async_trait;
use okv_types::{Address, Metadata, Record, ScanEntry};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::Backend;

struct Entry {
    address: Address,
    record: Record,
    /// Proactive-expiry task for this record, present when a TTL is set.
    /// Aborted whenever the record is overwritten or deleted, so a stale
    /// timer can never remove a newer record that reused the address.
    reaper: Option<JoinHandle<()>>,
}

type EntryMap = Arc<RwLock<HashMap<String, Entry>>>;

/// An in-memory implementation of [`Backend`].
///
/// TTL expiry is both proactive (a reaper task scheduled at write time) and
/// lazy: `get` and `scan` re-validate liveness regardless, so a missed timer
/// never resurrects an expired record as live. The reaper re-checks the
/// record's write timestamp before removing, and pending reapers are
/// cancelled on overwrite and delete.
pub struct MemoryBackend {
    entries: EntryMap,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of records currently held, including not-yet-reaped expired
    /// ones.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    fn spawn_reaper(
        entries: EntryMap,
        composite: String,
        stored_at: SystemTime,
        ttl: std::time::Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut map = entries.write().expect("lock poisoned");
            // Only remove the exact record this reaper was scheduled for; a
            // newer write at the same address carries a newer timestamp.
            let matches = map
                .get(&composite)
                .map(|entry| entry.record.stored_at == stored_at)
                .unwrap_or(false);
            if matches {
                map.remove(&composite);
                debug!(address = %composite, "reaped expired record");
            }
        })
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        let mut map = self.entries.write().expect("lock poisoned");
        for entry in map.values_mut() {
            if let Some(reaper) = entry.reaper.take() {
                reaper.abort();
            }
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn put(&self, addr: &Address, payload: Vec<u8>, metadata: Metadata) -> StoreResult<()> {
        let composite = addr.composite();
        let record = Record::new(payload, metadata);
        let reaper = record.metadata.ttl.map(|ttl| {
            Self::spawn_reaper(
                Arc::clone(&self.entries),
                composite.clone(),
                record.stored_at,
                ttl,
            )
        });

        let mut map = self.entries.write().expect("lock poisoned");
        if let Some(old) = map.insert(
            composite,
            Entry {
                address: addr.clone(),
                record,
                reaper,
            },
        ) {
            if let Some(old_reaper) = old.reaper {
                old_reaper.abort();
            }
        }
        Ok(())
    }

    async fn get(&self, addr: &Address) -> StoreResult<Option<Record>> {
        let composite = addr.composite();
        let now = SystemTime::now();
        {
            let map = self.entries.read().expect("lock poisoned");
            match map.get(&composite) {
                None => return Ok(None),
                Some(entry) if entry.record.is_live(now) => {
                    return Ok(Some(entry.record.clone()))
                }
                Some(_) => {}
            }
        }

        // Expired: discard lazily. Re-check under the write lock so a
        // concurrent overwrite is not clobbered.
        let mut map = self.entries.write().expect("lock poisoned");
        let expired = map
            .get(&composite)
            .map(|entry| entry.record.is_expired(now))
            .unwrap_or(false);
        if expired {
            if let Some(old) = map.remove(&composite) {
                if let Some(reaper) = old.reaper {
                    reaper.abort();
                }
            }
            debug!(address = %composite, "discarded expired record on read");
        }
        Ok(None)
    }

    async fn delete(&self, addr: &Address) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        if let Some(old) = map.remove(&addr.composite()) {
            if let Some(reaper) = old.reaper {
                reaper.abort();
            }
        }
        Ok(())
    }

    async fn scan(
        &self,
        namespace: &str,
        id: Option<&str>,
        key: Option<&str>,
    ) -> StoreResult<Vec<ScanEntry>> {
        let now = SystemTime::now();
        let map = self.entries.read().expect("lock poisoned");
        let results = map
            .values()
            .filter(|entry| entry.address.namespace == namespace)
            .filter(|entry| id.map_or(true, |id| entry.address.id == id))
            .filter(|entry| key.map_or(true, |key| entry.address.key == key))
            .filter(|entry| entry.record.is_live(now))
            .map(|entry| ScanEntry {
                address: entry.address.clone(),
                record: entry.record.clone(),
            })
            .collect();
        Ok(results)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("record_count", &self.len())
            .finish()
    }
}
