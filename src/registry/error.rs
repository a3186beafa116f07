//! Delivery error types

use std::time::Duration;

/// A single recipient could not be reached
///
/// Logged and skipped by the dispatcher; siblings are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound side is gone
    #[error("connection closed")]
    Closed,

    /// The send did not complete within the delivery timeout
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}
