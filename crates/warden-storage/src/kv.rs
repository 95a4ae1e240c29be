//! Namespaced key-value store.
//!
//! Keys live in namespaces so that unrelated records (suite settings,
//! install metadata) never collide. Implementations store the pair as the
//! composite `"{namespace}\0{key}"`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

fn check_segment(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{kind} must not be empty")));
    }
    if value.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "{kind} must not contain null bytes"
        )));
    }
    Ok(())
}

fn composite_key(namespace: &str, key: &str) -> String {
    format!("{namespace}\0{key}")
}

/// Byte-level storage scoped by namespace.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Value stored under `namespace`/`key`, if any.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value`, replacing any previous value.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Every key in `namespace`, in no particular order.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

/// Volatile store for tests and hosts that keep nothing across restarts.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(entries.get(&composite_key(namespace, key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        self.entries
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .insert(composite_key(namespace, key), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let removed = self
            .entries
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .remove(&composite_key(namespace, key));
        Ok(removed.is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_segment("namespace", namespace)?;
        let prefix = format!("{namespace}\0");
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(entries
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

/// Persistent store backed by an embedded `SurrealKV` tree.
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the tree cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::debug!(path = %path.as_ref().display(), "Opened settings store");
        Ok(Self { tree })
    }

    /// Flush and close the tree.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree.close().await.map_err(|e| internal(&e))
    }
}

#[cfg(feature = "kv")]
fn internal(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|e| internal(&e))?;
        tx.get(composite_key(namespace, key).as_bytes())
            .map_err(|e| internal(&e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let mut tx = self.tree.begin().map_err(|e| internal(&e))?;
        tx.set(composite_key(namespace, key).as_bytes(), &value)
            .map_err(|e| internal(&e))?;
        tx.commit().await.map_err(|e| internal(&e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let full = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|e| internal(&e))?;
        if tx.get(full.as_bytes()).map_err(|e| internal(&e))?.is_none() {
            return Ok(false);
        }
        tx.delete(full.as_bytes()).map_err(|e| internal(&e))?;
        tx.commit().await.map_err(|e| internal(&e))?;
        Ok(true)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_segment("namespace", namespace)?;
        // Every key of the namespace sorts in ["{ns}\0", "{ns}\x01").
        let start = format!("{namespace}\0");
        let end = format!("{namespace}\u{1}");

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|e| internal(&e))?;
        let mut iter = tx
            .range(start.as_bytes(), end.as_bytes())
            .map_err(|e| internal(&e))?;
        iter.seek_first().map_err(|e| internal(&e))?;

        let mut keys = Vec::new();
        while iter.valid() {
            let raw = iter.key();
            if let Some(rest) = raw.get(start.len()..)
                && let Ok(key) = std::str::from_utf8(rest)
                && !key.is_empty()
            {
                keys.push(key.to_string());
            }
            iter.next().map_err(|e| internal(&e))?;
        }
        Ok(keys)
    }
}

/// A [`KvStore`] view bound to one namespace.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Bind `store` to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an empty or null-containing
    /// namespace.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        check_segment("namespace", &namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The bound namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Value under `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, value).await
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.namespace, key).await
    }

    /// Keys in the bound namespace.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.namespace).await
    }
}
