//! Directory error types

use std::time::Duration;

/// The backing key-value store failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("directory store error: {0}")]
pub struct StoreError(pub String);

/// Error type for node directory operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Shared secret did not match; nothing was changed
    #[error("unauthorized")]
    Unauthorized,

    /// The directory was opened without a shared secret
    #[error("directory secret must not be empty")]
    EmptySecret,

    /// The store could not complete the operation
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A liveness probe failed; the node is treated as down
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Address could not be reached
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// No answer within the probe timeout
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}
