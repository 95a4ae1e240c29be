//! Warden Storage - persistence for suite settings records.
//!
//! The runtime only needs to keep small binary records per installed suite,
//! so storage is a namespaced byte-level key-value store:
//!
//! - [`MemoryKvStore`] (always available): tests and throwaway hosts
//! - `SurrealKvStore` (behind the **`kv`** feature): embedded, persistent
//!
//! Callers normally hold a [`ScopedKvStore`] bound to one namespace.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
