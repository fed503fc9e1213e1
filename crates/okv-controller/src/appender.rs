//! The versioning layer: append-only records with a latest-pointer index.
//!
//! [`AppenderController`] wraps a [`StorageController`] and turns the flat
//! key/value store into an append-only, latest-pointer-indexed store with
//! no backend-specific versioning support. Each `append` performs two
//! independent writes: the version record under its own key, then a
//! [`Pointer`] record under the reserved key `"default"` naming that key.
//!
//! There is no cross-record atomicity and no isolation between concurrent
//! appenders to the same id: two racing appends can interleave their
//! writes, leaving the pointer referencing either version, or a stale
//! pointer landing after a newer one. This is an accepted race — last
//! write wins per record — and is not papered over with retries.
//!
//! Superseded versions are never compacted or garbage collected; every
//! appended version stays addressable by its explicit key until it is
//! individually deleted or expires.

use std::sync::Arc;

use okv_store::Backend;
use okv_types::{AddressError, Metadata, Pointer, Record, ScanEntry, DEFAULT_KEY};
use tracing::debug;

use crate::error::ControllerResult;
use crate::storage::StorageController;

/// Versioning wrapper over a [`StorageController`].
#[derive(Clone, Debug)]
pub struct AppenderController {
    storage: StorageController,
}

impl AppenderController {
    /// Appender over a fresh storage controller for `backend`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            storage: StorageController::new(backend),
        }
    }

    /// Appender over an existing storage controller.
    pub fn from_storage(storage: StorageController) -> Self {
        Self { storage }
    }

    /// Appender over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::from_storage(StorageController::in_memory())
    }

    /// Fetch the record at the literal address — pointer or data, whatever
    /// lives there. Pure passthrough.
    pub async fn get(
        &self,
        namespace: &str,
        id: &str,
        key: Option<&str>,
    ) -> ControllerResult<Option<Record>> {
        self.storage.get(namespace, id, key).await
    }

    /// Append a new version under `key` and repoint `"default"` at it.
    ///
    /// The version record is written first, with the caller's metadata
    /// (including their gzip choice). If that write fails the append fails
    /// whole and the pointer is untouched. The pointer record is then
    /// written with `gzip` forced off, so it can always be parsed without
    /// a decompression step; a failure there leaves the version
    /// retrievable by explicit key but not observable as "latest".
    ///
    /// The reserved key `"default"` cannot itself be appended to: the
    /// pointer would name its own slot.
    pub async fn append(
        &self,
        namespace: &str,
        id: &str,
        key: &str,
        payload: Vec<u8>,
        metadata: Metadata,
    ) -> ControllerResult<()> {
        if key == DEFAULT_KEY {
            return Err(AddressError::ReservedKey(key.to_string()).into());
        }

        self.storage
            .put(namespace, id, Some(key), payload, metadata.clone())
            .await?;

        let pointer_payload = Pointer::new(key).to_payload()?;
        let pointer_metadata = Metadata {
            gzip: false,
            ..metadata
        };
        self.storage
            .put(namespace, id, Some(DEFAULT_KEY), pointer_payload, pointer_metadata)
            .await?;
        debug!(namespace, id, key, "appended version and updated latest pointer");
        Ok(())
    }

    /// Resolve the latest version of `id`.
    ///
    /// Absent pointer, malformed pointer payload, and an absent or expired
    /// target all resolve to `None` — "no latest version known". There is
    /// no fallback scan for other versions.
    pub async fn get_latest(
        &self,
        namespace: &str,
        id: &str,
    ) -> ControllerResult<Option<Record>> {
        let Some(pointer_record) = self.storage.get(namespace, id, Some(DEFAULT_KEY)).await?
        else {
            return Ok(None);
        };

        let Some(pointer) = Pointer::from_payload(&pointer_record.payload) else {
            debug!(namespace, id, "malformed latest pointer, treating as absent");
            return Ok(None);
        };

        self.storage
            .get(namespace, id, Some(pointer.latest_key.as_str()))
            .await
    }

    /// Delete the record at the given address only. No cascade to other
    /// versions, and the pointer is not repaired if the deleted key was
    /// the current latest — callers needing pointer consistency re-append
    /// or clear the pointer explicitly.
    pub async fn delete(
        &self,
        namespace: &str,
        id: &str,
        key: Option<&str>,
    ) -> ControllerResult<()> {
        self.storage.delete(namespace, id, key).await
    }

    /// Passthrough scan. Pointer records appear in the results like any
    /// other record; callers tell them apart by the `"default"` key and
    /// the payload shape.
    pub async fn scan(
        &self,
        namespace: &str,
        id: Option<&str>,
        key: Option<&str>,
    ) -> ControllerResult<Vec<ScanEntry>> {
        self.storage.scan(namespace, id, key).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use okv_types::Metadata;

    use super::*;

    // -----------------------------------------------------------------------
    // Append and latest resolution
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn append_then_get_latest() {
        let appender = AppenderController::in_memory();
        appender
            .append("prod", "doc", "v1", b"hello".to_vec(), Metadata::default())
            .await
            .unwrap();
        appender
            .append("prod", "doc", "v2", b"world".to_vec(), Metadata::default())
            .await
            .unwrap();

        let latest = appender.get_latest("prod", "doc").await.unwrap().unwrap();
        assert_eq!(latest.payload, b"world");

        // Earlier versions stay addressable by explicit key.
        let v1 = appender.get("prod", "doc", Some("v1")).await.unwrap().unwrap();
        assert_eq!(v1.payload, b"hello");
    }

    #[tokio::test]
    async fn get_latest_without_appends_is_none() {
        let appender = AppenderController::in_memory();
        assert!(appender.get_latest("prod", "doc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_with_gzip_still_resolves_latest() {
        let appender = AppenderController::in_memory();
        let meta = Metadata {
            gzip: true,
            ..Metadata::default()
        };
        appender
            .append("prod", "doc", "v1", b"compressed payload".to_vec(), meta)
            .await
            .unwrap();

        // The version is compressed; the pointer must not be.
        let latest = appender.get_latest("prod", "doc").await.unwrap().unwrap();
        assert_eq!(latest.payload, b"compressed payload");

        let pointer = appender.get("prod", "doc", None).await.unwrap().unwrap();
        assert!(!pointer.metadata.gzip);
        assert_eq!(pointer.payload, br#"{"latestKey":"v1"}"#);
    }

    #[tokio::test]
    async fn append_to_reserved_key_is_rejected() {
        let appender = AppenderController::in_memory();
        let err = appender
            .append("prod", "doc", "default", b"x".to_vec(), Metadata::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ControllerError::Address(AddressError::ReservedKey(_))
        ));
        // Nothing was written.
        assert!(appender.scan("prod", None, None).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Pointer isolation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn malformed_pointer_resolves_to_none() {
        let storage = StorageController::in_memory();
        storage
            .put("prod", "doc", None, b"not a pointer".to_vec(), Metadata::default())
            .await
            .unwrap();

        let appender = AppenderController::from_storage(storage);
        assert!(appender.get_latest("prod", "doc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pointer_to_missing_version_is_none() {
        let appender = AppenderController::in_memory();
        appender
            .append("prod", "doc", "v1", b"data".to_vec(), Metadata::default())
            .await
            .unwrap();
        appender.delete("prod", "doc", Some("v1")).await.unwrap();

        // The pointer still names v1; resolution reports absent, no
        // fallback to other versions.
        assert!(appender.get_latest("prod", "doc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pointer_to_expired_version_is_none() {
        let appender = AppenderController::in_memory();
        appender
            .append(
                "prod",
                "doc",
                "v1",
                b"data".to_vec(),
                Metadata {
                    ttl: Some(Duration::from_millis(10)),
                    ..Metadata::default()
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(appender.get_latest("prod", "doc").await.unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Delete and scan semantics
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_does_not_touch_pointer() {
        let appender = AppenderController::in_memory();
        appender
            .append("prod", "doc", "v1", b"a".to_vec(), Metadata::default())
            .await
            .unwrap();
        appender
            .append("prod", "doc", "v2", b"b".to_vec(), Metadata::default())
            .await
            .unwrap();
        appender.delete("prod", "doc", Some("v1")).await.unwrap();

        // v2 is still the latest; the pointer record is intact.
        let latest = appender.get_latest("prod", "doc").await.unwrap().unwrap();
        assert_eq!(latest.payload, b"b");
    }

    #[tokio::test]
    async fn scan_includes_pointer_records() {
        let appender = AppenderController::in_memory();
        appender
            .append("prod", "doc", "v1", b"data".to_vec(), Metadata::default())
            .await
            .unwrap();

        let hits = appender.scan("prod", Some("doc"), None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|hit| hit.address.key == "v1"));
        let pointer = hits
            .iter()
            .find(|hit| hit.address.key == DEFAULT_KEY)
            .expect("pointer record should appear in scans");
        assert!(Pointer::from_payload(&pointer.record.payload).is_some());
    }

    #[tokio::test]
    async fn get_is_pure_passthrough() {
        let appender = AppenderController::in_memory();
        appender
            .append("prod", "doc", "v1", b"data".to_vec(), Metadata::default())
            .await
            .unwrap();

        // Reading the default slot through `get` yields the raw pointer.
        let record = appender.get("prod", "doc", None).await.unwrap().unwrap();
        let pointer = Pointer::from_payload(&record.payload).unwrap();
        assert_eq!(pointer.latest_key, "v1");
    }
}
