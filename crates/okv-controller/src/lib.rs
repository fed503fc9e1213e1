//! Control layers over the OKV backend contract.
//!
//! Two layers, each backend-agnostic, stacked strictly downward:
//!
//! ```text
//! AppenderController -> StorageController -> dyn Backend
//! ```
//!
//! - [`StorageController`] validates addresses, applies transparent gzip
//!   compression on `put`/`get`, and forwards everything else unchanged.
//! - [`AppenderController`] layers an append-only versioning protocol on
//!   top: `append` writes a version record plus a latest-pointer record
//!   under the reserved key `"default"`, and `get_latest` resolves that
//!   pointer.
//!
//! Swapping the backend changes durability, latency, and consistency —
//! never the semantics of these layers.

pub mod appender;
pub mod error;
pub mod storage;

pub use appender::AppenderController;
pub use error::{ControllerError, ControllerResult};
pub use storage::{compress_payload, decompress_payload, StorageController};
