//! Node directory implementation
//!
//! Storage layout in the shared store:
//!
//! | key                     | value        |
//! |-------------------------|--------------|
//! | `nodes:{id}`            | `addr:port`  |
//! | `nodes:available:{id}`  | hostname     |
//!
//! A node is *registered* while its address key exists and *available* while
//! its availability key also exists.

use std::collections::BTreeMap;

use super::error::{DirectoryError, StoreError};
use super::store::DirectoryStore;
use crate::secret::secret_matches;

/// Identifier of a node process
pub type NodeId = u64;

const NODE_PREFIX: &str = "nodes:";
const AVAILABLE_PREFIX: &str = "nodes:available:";

/// Key holding a node's address
pub fn address_key(node_id: NodeId) -> String {
    format!("{NODE_PREFIX}{node_id}")
}

/// Key holding an available node's hostname
pub fn available_key(node_id: NodeId) -> String {
    format!("{AVAILABLE_PREFIX}{node_id}")
}

/// Directory view of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub node_id: NodeId,
    /// `addr:port` the node was registered with
    pub address: Option<String>,
    /// Hostname advertised while available
    pub hostname: Option<String>,
    pub registered: bool,
    /// Always implies `registered`
    pub available: bool,
}

/// Cross-process registry of node addresses and availability
///
/// Mutating operations take the caller's shared secret and compare it in
/// constant time before touching the store.
pub struct NodeDirectory<S> {
    store: S,
    secret: String,
}

impl<S: DirectoryStore> NodeDirectory<S> {
    /// Open the directory over a store
    ///
    /// Fails with [`DirectoryError::EmptySecret`] when `secret` is empty.
    pub fn open(store: S, secret: impl Into<String>) -> Result<Self, DirectoryError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(DirectoryError::EmptySecret);
        }
        Ok(Self { store, secret })
    }

    /// Close the underlying store
    pub async fn close(&self) {
        self.store.close().await;
        tracing::debug!("Node directory closed");
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check a caller-supplied secret
    pub fn authorize(&self, given: &str) -> Result<(), DirectoryError> {
        if secret_matches(given, &self.secret) {
            Ok(())
        } else {
            Err(DirectoryError::Unauthorized)
        }
    }

    /// Register a node and mark it available
    ///
    /// The first registration for an id wins. Later calls for the same id are
    /// no-ops, even if the node was drained with [`update`](Self::update).
    /// Returns whether this call created the entry.
    pub async fn register(
        &self,
        secret: &str,
        node_id: NodeId,
        address: &str,
        hostname: &str,
    ) -> Result<bool, DirectoryError> {
        self.authorize(secret)?;

        if !self.store.set_if_absent(&address_key(node_id), address).await? {
            tracing::debug!(node_id = node_id, "Node already registered");
            return Ok(false);
        }
        self.store.set(&available_key(node_id), hostname).await?;

        tracing::info!(
            node_id = node_id,
            address = address,
            hostname = hostname,
            "Node registered"
        );
        Ok(true)
    }

    /// Remove both of a node's entries
    ///
    /// Returns whether the node was registered.
    pub async fn unregister(&self, secret: &str, node_id: NodeId) -> Result<bool, DirectoryError> {
        self.authorize(secret)?;
        let existed = self.evict(node_id).await?;

        if existed {
            tracing::info!(node_id = node_id, "Node unregistered");
        }
        Ok(existed)
    }

    /// Drain a node from discovery while keeping its address on record
    ///
    /// Returns whether the node was registered.
    pub async fn update(&self, secret: &str, node_id: NodeId) -> Result<bool, DirectoryError> {
        self.authorize(secret)?;

        if self.store.get(&address_key(node_id)).await?.is_none() {
            return Ok(false);
        }
        self.store.delete(&[available_key(node_id)]).await?;

        tracing::info!(node_id = node_id, "Node removed from available nodes");
        Ok(true)
    }

    /// Hostnames of every available node
    pub async fn list(&self) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .filter(|r| r.available)
            .filter_map(|r| r.hostname)
            .collect())
    }

    /// Every node known to the directory, ordered by id
    pub async fn records(&self) -> Result<Vec<NodeRecord>, DirectoryError> {
        let mut records: BTreeMap<NodeId, NodeRecord> = BTreeMap::new();

        for (key, value) in self.store.scan_prefix(NODE_PREFIX).await? {
            let (id, is_available) = match key.strip_prefix(AVAILABLE_PREFIX) {
                Some(id) => (id, true),
                None => (&key[NODE_PREFIX.len()..], false),
            };
            let Ok(node_id) = id.parse::<NodeId>() else {
                tracing::trace!(key = %key, "Skipping foreign directory key");
                continue;
            };

            let record = records.entry(node_id).or_insert_with(|| NodeRecord {
                node_id,
                address: None,
                hostname: None,
                registered: false,
                available: false,
            });
            if is_available {
                record.hostname = Some(value);
            } else {
                record.address = Some(value);
                record.registered = true;
            }
        }

        Ok(records
            .into_values()
            .map(|mut record| {
                record.available = record.registered && record.hostname.is_some();
                record
            })
            .collect())
    }

    /// Delete both entries without a secret check
    ///
    /// Used by the reaper, which runs inside a trusted node process.
    pub(crate) async fn evict(&self, node_id: NodeId) -> Result<bool, StoreError> {
        let removed = self
            .store
            .delete(&[address_key(node_id), available_key(node_id)])
            .await?;
        Ok(removed > 0)
    }
}
