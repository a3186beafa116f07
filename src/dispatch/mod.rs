//! Event dispatch
//!
//! Events flow from producers through a bounded FIFO queue into a single
//! dispatcher task that fans each one out to the online recipients.
//!
//! ```text
//!  [request handler] ──┐
//!                      ├──► EventQueue ──► EventDispatcher ──► resolver
//!  [inbound frame]  ───┘      (mpsc)            │
//!                                               ├──► registry.resolve_live()
//!                                               │
//!                                               └──► join_all(handle.send(frame))
//! ```
//!
//! Delivery is at most once per online recipient. A failed or timed-out
//! delivery is logged and skipped; the durable side effect of the event was
//! committed before it was enqueued, so only its live visibility is lost.

pub mod config;
pub mod dispatcher;
pub mod queue;

pub use config::DispatcherConfig;
pub use dispatcher::EventDispatcher;
pub use queue::{DispatchError, EventQueue};
