//! Flat-file backend: one JSON envelope file per record.
//!
//! On-disk layout:
//! ```text
//! <base>/<namespace>/<id>/<key>.json
//! ```
//! Each file is a JSON object `{ "object": <base64 payload>, "meta":
//! <metadata>, "timestamp": <epoch ms> }`. Payloads are base64-encoded so
//! the envelope stays text-safe regardless of content.
//!
//! Expiry is lazy: `get` deletes a stale file as a side effect and reports
//! absence; `scan` skips stale files without deleting them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use okv_types::{epoch_ms, from_epoch_ms, Address, Metadata, Record, ScanEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::Backend;

const ENVELOPE_EXT: &str = "json";

/// The persisted envelope for one record.
#[derive(Serialize, Deserialize)]
struct Envelope {
    /// Base64-encoded payload bytes, exactly as the caller stored them.
    object: String,
    /// Record metadata in canonical typed form.
    meta: Metadata,
    /// Write time, milliseconds since the Unix epoch.
    timestamp: u64,
}

impl Envelope {
    fn into_record(self, addr_display: &str) -> StoreResult<Record> {
        let payload = BASE64
            .decode(&self.object)
            .map_err(|e| StoreError::Corrupt {
                address: addr_display.to_string(),
                reason: format!("bad base64 payload: {e}"),
            })?;
        Ok(Record {
            payload,
            metadata: self.meta,
            stored_at: from_epoch_ms(self.timestamp),
        })
    }
}

/// A filesystem implementation of [`Backend`].
///
/// Writes go to a temporary sibling file and are renamed into place, so a
/// concurrent reader sees either the old record or the new one, never a
/// partial write.
#[derive(Debug)]
pub struct FlatFileBackend {
    base: PathBuf,
}

impl FlatFileBackend {
    /// Create a backend rooted at `base`. The directory is created on first
    /// write; a missing root reads as an empty store.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The root directory of this store.
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    fn record_path(&self, addr: &Address) -> PathBuf {
        self.base
            .join(&addr.namespace)
            .join(&addr.id)
            .join(format!("{}.{ENVELOPE_EXT}", addr.key))
    }

    /// Read and decode the envelope at `path`, without a liveness check.
    /// Returns `None` if the file does not exist.
    async fn read_envelope(path: &Path, addr_display: &str) -> StoreResult<Option<Record>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let envelope: Envelope =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                address: addr_display.to_string(),
                reason: format!("bad envelope: {e}"),
            })?;
        envelope.into_record(addr_display).map(Some)
    }
}

#[async_trait]
impl Backend for FlatFileBackend {
    async fn put(&self, addr: &Address, payload: Vec<u8>, metadata: Metadata) -> StoreResult<()> {
        let path = self.record_path(addr);
        let dir = path.parent().expect("record path always has a parent");
        tokio::fs::create_dir_all(dir).await?;

        let envelope = Envelope {
            object: BASE64.encode(&payload),
            meta: metadata,
            timestamp: epoch_ms(SystemTime::now()),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        // Write-then-rename keeps replacement atomic for readers. The tmp
        // name is unique per writer so concurrent puts to the same address
        // race only on the final rename (last write wins), never on the
        // intermediate file.
        let tmp = dir.join(format!(
            "{}.{}.{}.tmp",
            addr.key,
            std::process::id(),
            next_tmp_seq()
        ));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(address = %addr, bytes = bytes.len(), "wrote record file");
        Ok(())
    }

    async fn get(&self, addr: &Address) -> StoreResult<Option<Record>> {
        let path = self.record_path(addr);
        let record = match Self::read_envelope(&path, &addr.to_string()).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        if record.is_expired(SystemTime::now()) {
            // Lazy cleanup; a failed unlink does not fail the read.
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(address = %addr, error = %e, "failed to remove expired record file");
            } else {
                debug!(address = %addr, "discarded expired record on read");
            }
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn delete(&self, addr: &Address) -> StoreResult<()> {
        match tokio::fs::remove_file(self.record_path(addr)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan(
        &self,
        namespace: &str,
        id: Option<&str>,
        key: Option<&str>,
    ) -> StoreResult<Vec<ScanEntry>> {
        let ns_dir = self.base.join(namespace);
        let ids = match id {
            Some(id) => vec![id.to_string()],
            None => match list_dir_names(&ns_dir).await? {
                Some(names) => names,
                None => return Ok(Vec::new()),
            },
        };

        let now = SystemTime::now();
        let mut results = Vec::new();
        for current_id in &ids {
            let id_dir = ns_dir.join(current_id);
            let keys = match key {
                Some(key) => vec![key.to_string()],
                None => match list_key_names(&id_dir).await? {
                    Some(keys) => keys,
                    None => continue,
                },
            };

            for current_key in &keys {
                let address = match Address::new(namespace, current_id, current_key) {
                    Ok(address) => address,
                    Err(e) => {
                        // Foreign directory entries are not ours to report.
                        debug!(namespace, id = %current_id, key = %current_key, error = %e,
                            "skipping non-record entry during scan");
                        continue;
                    }
                };
                let path = id_dir.join(format!("{current_key}.{ENVELOPE_EXT}"));
                match Self::read_envelope(&path, &address.to_string()).await? {
                    Some(record) if record.is_live(now) => {
                        results.push(ScanEntry { address, record });
                    }
                    _ => {}
                }
            }
        }
        Ok(results)
    }
}

/// Monotonic sequence for tmp-file names within this process.
fn next_tmp_seq() -> u64 {
    static TMP_SEQ: AtomicU64 = AtomicU64::new(0);
    TMP_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Names of subdirectory entries of `dir`, or `None` if `dir` is missing.
async fn list_dir_names(dir: &Path) -> StoreResult<Option<Vec<String>>> {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(Some(names))
}

/// Key names for every `*.json` envelope directly under `dir`, or `None` if
/// `dir` is missing. In-flight `*.tmp` files are excluded.
async fn list_key_names(dir: &Path) -> StoreResult<Option<Vec<String>>> {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut keys = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ENVELOPE_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            keys.push(stem.to_string());
        }
    }
    Ok(Some(keys))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    fn addr(ns: &str, id: &str, key: &str) -> Address {
        Address::new(ns, id, key).unwrap()
    }

    fn store() -> (TempDir, FlatFileBackend) {
        let dir = TempDir::new().unwrap();
        let backend = FlatFileBackend::new(dir.path());
        (dir, backend)
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_get() {
        let (_dir, store) = store();
        let a = addr("prod", "hello", "world");
        store
            .put(&a, b"abc123".to_vec(), Metadata::default())
            .await
            .unwrap();

        let record = store.get(&a).await.unwrap().expect("should exist");
        assert_eq!(record.payload, b"abc123");
        assert!(!record.metadata.gzip);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let (_dir, store) = store();
        assert!(store.get(&addr("ns", "id", "key")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = store();
        let a = addr("ns", "id", "key");
        store.put(&a, b"x".to_vec(), Metadata::default()).await.unwrap();
        store.delete(&a).await.unwrap();
        assert!(store.get(&a).await.unwrap().is_none());
        store.delete(&a).await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Concurrent writes
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_puts_to_same_address_all_succeed() {
        let (dir, store) = store();
        let store = std::sync::Arc::new(store);
        let a = addr("ns", "id", "key");

        let handles: Vec<_> = (0..8u8)
            .map(|n| {
                let store = std::sync::Arc::clone(&store);
                let a = a.clone();
                tokio::spawn(async move {
                    store.put(&a, vec![n; 64], Metadata::default()).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().expect("no writer should fail");
        }

        // One of the racing payloads won; no tmp files are left behind.
        let record = store.get(&a).await.unwrap().expect("should exist");
        assert_eq!(record.payload.len(), 64);
        let files: Vec<_> = std::fs::read_dir(dir.path().join("ns").join("id"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["key.json".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Persisted layout
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn envelope_layout_is_stable() {
        let (dir, store) = store();
        let a = addr("ns", "doc", "v1");
        let meta = Metadata {
            ttl: Some(Duration::from_secs(60)),
            mime_type: Some("text/plain".into()),
            gzip: false,
        };
        store.put(&a, b"hello".to_vec(), meta).await.unwrap();

        let path = dir.path().join("ns").join("doc").join("v1.json");
        let raw = std::fs::read(&path).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["object"], BASE64.encode(b"hello"));
        assert_eq!(value["meta"]["ttl"], 60_000);
        assert_eq!(value["meta"]["mimeType"], "text/plain");
        assert_eq!(value["meta"]["gzip"], false);
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn corrupt_envelope_is_an_error() {
        let (dir, store) = store();
        let id_dir = dir.path().join("ns").join("doc");
        std::fs::create_dir_all(&id_dir).unwrap();
        std::fs::write(id_dir.join("v1.json"), b"not json").unwrap();

        let err = store.get(&addr("ns", "doc", "v1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    // -----------------------------------------------------------------------
    // TTL expiry
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn expired_record_is_absent_and_file_removed() {
        let (dir, store) = store();
        let a = addr("ns", "id", "key");
        store
            .put(
                &a,
                b"x".to_vec(),
                Metadata {
                    ttl: Some(Duration::from_millis(10)),
                    ..Metadata::default()
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get(&a).await.unwrap().is_none());
        assert!(!dir.path().join("ns").join("id").join("key.json").exists());
    }

    // -----------------------------------------------------------------------
    // Scan
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn scan_narrows_by_id_and_key() {
        let (_dir, store) = store();
        store
            .put(&addr("ns", "a", "k1"), b"1".to_vec(), Metadata::default())
            .await
            .unwrap();
        store
            .put(&addr("ns", "a", "k2"), b"2".to_vec(), Metadata::default())
            .await
            .unwrap();
        store
            .put(&addr("ns", "b", "k1"), b"3".to_vec(), Metadata::default())
            .await
            .unwrap();

        assert_eq!(store.scan("ns", None, None).await.unwrap().len(), 3);
        assert_eq!(store.scan("ns", Some("a"), None).await.unwrap().len(), 2);

        let hits = store.scan("ns", Some("b"), Some("k1")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.payload, b"3");
        assert_eq!(hits[0].address, addr("ns", "b", "k1"));
    }

    #[tokio::test]
    async fn scan_missing_namespace_is_empty() {
        let (_dir, store) = store();
        assert!(store.scan("nothing", None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_missing_key_is_empty() {
        let (_dir, store) = store();
        store
            .put(&addr("ns", "a", "k1"), b"1".to_vec(), Metadata::default())
            .await
            .unwrap();
        assert!(store
            .scan("ns", Some("a"), Some("absent"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn scan_excludes_expired() {
        let (_dir, store) = store();
        store
            .put(&addr("ns", "a", "keep"), b"1".to_vec(), Metadata::default())
            .await
            .unwrap();
        store
            .put(
                &addr("ns", "a", "drop"),
                b"2".to_vec(),
                Metadata {
                    ttl: Some(Duration::from_millis(10)),
                    ..Metadata::default()
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        let hits = store.scan("ns", None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].address.key, "keep");
    }
}
