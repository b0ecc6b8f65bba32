//! # Codescope Cache Store
//!
//! Content-hash-validated persistent key/value store for analysis results.
//!
//! Entries are serialized JSON envelopes (optionally gzip-compressed) written
//! under a single cache directory. Each envelope records the content hash of
//! the input it was derived from; a lookup that supplies a fresh hash which
//! disagrees with the stored one deletes the entry and reports a miss, so
//! stale results never survive an edit.
//!
//! Corruption is never fatal: any entry that fails to read, decompress, or
//! deserialize is silently removed and treated as a miss.
//!
//! Eviction is two-phase: entries older than the configured maximum age are
//! deleted when the store opens, and after every write the oldest entries are
//! deleted until the store fits under its size cap.

mod error;
mod store;

pub use error::{CacheError, Result};
pub use store::{CacheConfig, CacheInfo, CacheStore};
