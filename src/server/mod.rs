//! Node process wiring
//!
//! [`ChatNode`] is the entry point: it owns the connection registry, the
//! event queue and the node directory, and runs the WebSocket listener, the
//! node HTTP API, the dispatcher and the reaper under one cancellation token.

pub mod config;
pub mod listener;
pub mod node;

pub use config::{ConfigError, NodeConfig};
pub use listener::SessionListener;
pub use node::ChatNode;
