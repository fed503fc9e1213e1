//! The storage-policy layer: address validation and transparent gzip.
//!
//! [`StorageController`] wraps one backend and owns no state beyond that
//! reference. When a caller writes with `metadata.gzip = true`, the payload
//! is compressed before it reaches the backend and the flag is stored
//! as-is, so the reverse transform is self-describing on read.
//!
//! `scan` results are deliberately NOT decompressed: bulk reads return raw
//! stored bytes, and callers that need the plain payload apply
//! [`decompress_payload`] themselves, keyed off each entry's `gzip` flag.
//! Only single-object `get` decompresses.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use okv_store::{Backend, FlatFileBackend, MemoryBackend, RemoteBackend, RemoteConfig};
use okv_types::{validate_segment, Address, Metadata, Record, ScanEntry, DEFAULT_KEY};
use tracing::debug;

use crate::error::{ControllerError, ControllerResult};

/// Gzip-compress a payload.
pub fn compress_payload(payload: &[u8]) -> ControllerResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).map_err(ControllerError::Codec)?;
    encoder.finish().map_err(ControllerError::Codec)
}

/// Gzip-decompress a stored payload.
///
/// Corrupt data is a [`ControllerError::Codec`], never silently returned
/// compressed bytes.
pub fn decompress_payload(payload: &[u8]) -> ControllerResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(payload);
    let mut plain = Vec::new();
    decoder
        .read_to_end(&mut plain)
        .map_err(ControllerError::Codec)?;
    Ok(plain)
}

/// Backend wrapper adding address validation and transparent compression.
#[derive(Clone)]
pub struct StorageController {
    backend: Arc<dyn Backend>,
}

impl StorageController {
    /// Wrap an existing backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Controller over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Controller over a [`FlatFileBackend`] rooted at `base`.
    pub fn flat_file(base: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FlatFileBackend::new(base)))
    }

    /// Controller over a [`RemoteBackend`] for `config`.
    pub fn remote(config: RemoteConfig) -> ControllerResult<Self> {
        Ok(Self::new(Arc::new(RemoteBackend::new(config)?)))
    }

    fn address(namespace: &str, id: &str, key: Option<&str>) -> ControllerResult<Address> {
        Ok(Address::new(namespace, id, key.unwrap_or(DEFAULT_KEY))?)
    }

    /// Store a payload. With `metadata.gzip`, the payload is compressed
    /// first and the compressed bytes are what the backend persists.
    ///
    /// A missing `key` addresses the reserved `"default"` slot.
    pub async fn put(
        &self,
        namespace: &str,
        id: &str,
        key: Option<&str>,
        payload: Vec<u8>,
        metadata: Metadata,
    ) -> ControllerResult<()> {
        let addr = Self::address(namespace, id, key)?;
        let stored = if metadata.gzip {
            let compressed = compress_payload(&payload)?;
            debug!(address = %addr, plain = payload.len(), compressed = compressed.len(),
                "compressed payload");
            compressed
        } else {
            payload
        };
        self.backend.put(&addr, stored, metadata).await?;
        Ok(())
    }

    /// Fetch the live record at the address, decompressing the payload when
    /// its stored metadata says it was compressed.
    pub async fn get(
        &self,
        namespace: &str,
        id: &str,
        key: Option<&str>,
    ) -> ControllerResult<Option<Record>> {
        let addr = Self::address(namespace, id, key)?;
        let Some(mut record) = self.backend.get(&addr).await? else {
            return Ok(None);
        };
        if record.metadata.gzip {
            record.payload = decompress_payload(&record.payload)?;
        }
        Ok(Some(record))
    }

    /// Remove any record at the address. Absence is a no-op.
    pub async fn delete(
        &self,
        namespace: &str,
        id: &str,
        key: Option<&str>,
    ) -> ControllerResult<()> {
        let addr = Self::address(namespace, id, key)?;
        self.backend.delete(&addr).await?;
        Ok(())
    }

    /// List live records, optionally narrowed by id and/or key. Entries are
    /// returned with raw stored bytes; see the module docs for why scan
    /// does not decompress.
    pub async fn scan(
        &self,
        namespace: &str,
        id: Option<&str>,
        key: Option<&str>,
    ) -> ControllerResult<Vec<ScanEntry>> {
        validate_segment("namespace", namespace)?;
        if let Some(id) = id {
            validate_segment("id", id)?;
        }
        if let Some(key) = key {
            validate_segment("key", key)?;
        }
        Ok(self.backend.scan(namespace, id, key).await?)
    }
}

impl std::fmt::Debug for StorageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageController").finish_non_exhaustive()
    }
}
