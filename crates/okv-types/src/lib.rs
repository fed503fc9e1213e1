//! Foundation types for OKV.
//!
//! This crate provides the core data model shared by every other OKV crate:
//! addresses, record metadata, stored records, and the latest-pointer format
//! used by the appender layer.
//!
//! # Key Types
//!
//! - [`Address`] — Validated (namespace, id, key) triple identifying one record slot
//! - [`Metadata`] — Per-record policy metadata: TTL, MIME type, gzip flag
//! - [`Record`] — A stored payload with its metadata and write timestamp
//! - [`ScanEntry`] — A scan hit: the address a record was found at, plus the record
//! - [`Pointer`] — The reserved `"default"`-key record naming the latest version

pub mod address;
pub mod error;
pub mod pointer;
pub mod record;

pub use address::{validate_segment, Address, DEFAULT_KEY};
pub use error::AddressError;
pub use pointer::Pointer;
pub use record::{epoch_ms, from_epoch_ms, Metadata, Record, ScanEntry};
