//! Remote object-store backend.
//!
//! Speaks plain HTTP to an S3-style object-store gateway: one object per
//! record at `<endpoint>/<namespace>/<id>/<key>`, with the bucket named by
//! the namespace. Gateway metadata is string-only, so every metadata field
//! travels as a header string: the timestamp and TTL as decimal millisecond
//! digits, the gzip flag as the literal `"true"`/`"false"`.
//!
//! `scan` lists object keys by id-prefix and then fetches each object
//! individually to inspect its metadata. This is an O(N) listing+fetch
//! pattern and the dominant latency cost of this backend. Scan consistency
//! is only as strong as the gateway's listing: a concurrently deleted
//! object simply drops out of the results, and a concurrently created one
//! may or may not appear (eventual consistency, accepted).

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use okv_types::{epoch_ms, from_epoch_ms, Address, Metadata, Record, ScanEntry};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::Backend;

const HEADER_TIMESTAMP: &str = "x-okv-meta-timestamp";
const HEADER_TTL: &str = "x-okv-meta-ttl";
const HEADER_MIME_TYPE: &str = "x-okv-meta-mime-type";
const HEADER_GZIP: &str = "x-okv-meta-gzip";
const HEADER_ACL: &str = "x-amz-acl";

/// Connection configuration for the remote backend.
///
/// Shared read-only after construction; the backend never mutates it.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    /// Base URL of the object-store gateway, without a trailing slash.
    pub endpoint: String,
    /// Region hint, used when deriving a default endpoint.
    pub region: String,
    /// Canned ACL applied to every stored object.
    pub acl: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Configuration for an explicit gateway endpoint, with default region
    /// (`us-east-1`), ACL (`private`), and timeout (30 s).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: "us-east-1".to_string(),
            acl: "private".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Configuration for the standard S3 gateway endpoint of `region`.
    pub fn for_region(region: &str) -> Self {
        Self {
            endpoint: format!("https://s3.{region}.amazonaws.com"),
            region: region.to_string(),
            ..Self::new("")
        }
    }

    /// Replace the canned ACL.
    pub fn with_acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = acl.into();
        self
    }
}

/// A remote object-store implementation of [`Backend`].
pub struct RemoteBackend {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl RemoteBackend {
    /// Create a backend for `config`. Builds the HTTP client once; the
    /// client is shared across all operations.
    pub fn new(config: RemoteConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// The connection configuration this backend was built with.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn object_url(&self, addr: &Address) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            addr.namespace,
            addr.id,
            addr.key
        )
    }

    fn list_url(&self, namespace: &str, prefix: &str) -> String {
        format!(
            "{}/{}?prefix={}",
            self.config.endpoint.trim_end_matches('/'),
            namespace,
            prefix
        )
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn put(&self, addr: &Address, payload: Vec<u8>, metadata: Metadata) -> StoreResult<()> {
        let mut request = self
            .client
            .put(self.object_url(addr))
            .header(HEADER_ACL, &self.config.acl);
        for (name, value) in encode_metadata(&metadata, SystemTime::now()) {
            request = request.header(name, value);
        }
        request.body(payload).send().await?.error_for_status()?;
        debug!(address = %addr, "stored remote object");
        Ok(())
    }

    async fn get(&self, addr: &Address) -> StoreResult<Option<Record>> {
        let response = self.client.get(self.object_url(addr)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let (metadata, stored_at) = decode_metadata(response.headers(), &addr.to_string())?;
        let payload = response.bytes().await?.to_vec();
        let record = Record {
            payload,
            metadata,
            stored_at,
        };

        if record.is_expired(SystemTime::now()) {
            // Lazy cleanup; a failed delete does not fail the read.
            if let Err(e) = self.delete(addr).await {
                warn!(address = %addr, error = %e, "failed to remove expired remote object");
            } else {
                debug!(address = %addr, "discarded expired remote object on read");
            }
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn delete(&self, addr: &Address) -> StoreResult<()> {
        let response = self.client.delete(self.object_url(addr)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }

    async fn scan(
        &self,
        namespace: &str,
        id: Option<&str>,
        key: Option<&str>,
    ) -> StoreResult<Vec<ScanEntry>> {
        let prefix = id.map(|id| format!("{id}/")).unwrap_or_default();
        let object_keys: Vec<String> = self
            .client
            .get(self.list_url(namespace, &prefix))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // One fetch per listed object; an object deleted since the listing
        // reads as absent and drops out of the results.
        let mut results = Vec::new();
        for object_key in object_keys {
            let Some((obj_id, obj_key)) = object_key.split_once('/') else {
                debug!(namespace, object_key = %object_key, "skipping unrecognized listing entry");
                continue;
            };
            if key.is_some_and(|key| key != obj_key) {
                continue;
            }
            let Ok(address) = Address::new(namespace, obj_id, obj_key) else {
                debug!(namespace, object_key = %object_key, "skipping non-record listing entry");
                continue;
            };
            if let Some(record) = self.get(&address).await? {
                results.push(ScanEntry { address, record });
            }
        }
        Ok(results)
    }
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("endpoint", &self.config.endpoint)
            .field("region", &self.config.region)
            .finish()
    }
}

/// Serialize metadata to the gateway's string-only header form.
fn encode_metadata(metadata: &Metadata, stored_at: SystemTime) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        (HEADER_TIMESTAMP, epoch_ms(stored_at).to_string()),
        (HEADER_GZIP, if metadata.gzip { "true" } else { "false" }.to_string()),
    ];
    if let Some(ttl) = metadata.ttl {
        headers.push((HEADER_TTL, (ttl.as_millis() as u64).to_string()));
    }
    if let Some(mime_type) = &metadata.mime_type {
        headers.push((HEADER_MIME_TYPE, mime_type.clone()));
    }
    headers
}

/// Parse metadata headers back into the canonical typed form.
///
/// A missing timestamp or an unparseable value is `Corrupt`, never a
/// silent default.
fn decode_metadata(headers: &HeaderMap, address: &str) -> StoreResult<(Metadata, SystemTime)> {
    let header_str = |name: &str| -> Option<&str> {
        headers.get(name).and_then(|value| value.to_str().ok())
    };
    let corrupt = |reason: String| StoreError::Corrupt {
        address: address.to_string(),
        reason,
    };

    let timestamp = header_str(HEADER_TIMESTAMP)
        .ok_or_else(|| corrupt(format!("missing {HEADER_TIMESTAMP} header")))?
        .parse::<u64>()
        .map_err(|e| corrupt(format!("bad {HEADER_TIMESTAMP} header: {e}")))?;

    let ttl = match header_str(HEADER_TTL) {
        None | Some("") => None,
        Some(value) => Some(Duration::from_millis(
            value
                .parse::<u64>()
                .map_err(|e| corrupt(format!("bad {HEADER_TTL} header: {e}")))?,
        )),
    };

    let gzip = match header_str(HEADER_GZIP) {
        None => false,
        Some("true") => true,
        Some("false") => false,
        Some(other) => return Err(corrupt(format!("bad {HEADER_GZIP} header: {other:?}"))),
    };

    let metadata = Metadata {
        ttl,
        mime_type: header_str(HEADER_MIME_TYPE).map(str::to_string),
        gzip,
    };
    Ok((metadata, from_epoch_ms(timestamp)))
}
