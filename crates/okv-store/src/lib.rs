//! Storage backends for OKV.
//!
//! This crate defines the backend contract — four operations (`put`, `get`,
//! `delete`, `scan`) keyed by (namespace, id, key) — and three conforming
//! adapters of very different durability and latency:
//!
//! - [`MemoryBackend`] — process-local `HashMap` store with proactive TTL
//!   reapers; for tests, embedding, and ephemeral caches
//! - [`FlatFileBackend`] — one JSON envelope file per record under a
//!   `namespace/id/` directory tree
//! - [`RemoteBackend`] — HTTP adapter for an S3-style object-store gateway
//!   with string-only metadata
//!
//! # Design Rules
//!
//! 1. Expired records behave as absent to every read and scan; physical
//!    removal may be lazy, logical absence is immediate.
//! 2. Not-found and expired are `Ok(None)` (or scan omission), never errors.
//! 3. I/O failures are propagated, never logged-and-swallowed; callers own
//!    retry policy.
//! 4. Swapping backends changes durability and consistency, never the API
//!    contract.

pub mod error;
pub mod flatfile;
pub mod memory;
pub mod remote;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use flatfile::FlatFileBackend;
pub use memory::MemoryBackend;
pub use remote::{RemoteBackend, RemoteConfig};
pub use traits::Backend;
