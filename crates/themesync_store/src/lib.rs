//! # themesync store
//!
//! File-backed version ledger for themesync.
//!
//! The store is a small nested key-value map persisted as a single text file:
//!
//! ```text
//! collection (file path) -> key (environment name) -> value (version token)
//! ```
//!
//! ## Design Principles
//!
//! - Values are opaque strings; the store never interprets version tokens
//! - Writes go through a [`Batch`] and land all-or-nothing
//! - Every mutation rewrites the whole file with write-then-rename
//! - A missing file is an empty store, a malformed one is a fatal error
//!
//! ## Example
//!
//! ```no_run
//! use themesync_store::VersionStore;
//! use std::path::Path;
//!
//! let store = VersionStore::open(Path::new("themesync.lock")).unwrap();
//! let mut batch = store.batch();
//! batch.write("templates/index.liquid", "production", "2021-01-01T00:00:00Z").unwrap();
//! batch.commit().unwrap();
//! assert_eq!(
//!     store.read("templates/index.liquid", "production").unwrap(),
//!     "2021-01-01T00:00:00Z"
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod error;
mod format;
mod store;

pub use batch::Batch;
pub use error::{StoreError, StoreResult};
pub use store::{Snapshot, VersionStore, TEMP_SUFFIX};
