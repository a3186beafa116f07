//! Key-value storage behind the node directory
//!
//! The directory is shared by every node process, so it lives in an external
//! key-value service. [`DirectoryStore`] is the slice of that service the
//! directory needs; [`MemoryDirectoryStore`] implements it in process.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::StoreError;

/// Shared key-value space
pub trait DirectoryStore: Send + Sync + 'static {
    /// Read a key
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Write a key, replacing any previous value
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write a key only if it does not exist; returns whether it was written
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Delete keys; returns how many existed
    fn delete(&self, keys: &[String]) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Every `(key, value)` whose key starts with `prefix`
    fn scan_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<(String, String)>, StoreError>> + Send;

    /// Release the connection to the store
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// In-process store
///
/// Clones share the same map, so several nodes in one process (or a node and
/// its HTTP surface) see the same directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DirectoryStore for MemoryDirectoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut entries = self.entries.write();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
