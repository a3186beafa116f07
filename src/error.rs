//! Crate-level error type
//!
//! Each subsystem has its own error enum; this type wraps them for callers
//! that drive the whole node (listeners, startup, config loading).

use crate::directory::DirectoryError;
use crate::dispatch::DispatchError;
use crate::registry::DeliveryError;
use crate::server::ConfigError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single recipient could not be reached
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// Node directory rejected or failed the operation
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The event queue rejected an event
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// WebSocket handshake or framing failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
