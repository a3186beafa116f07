//! Presence tracking and live event fanout for a multi-node chat backend
//!
//! Each node process tracks which users hold a live WebSocket connection to
//! it, resolves chat events to the users that should see them, and pushes
//! the event to every recipient connected to this node. Nodes find each
//! other through a shared directory and prune peers that stop answering.
//!
//! # Example
//!
//! ```no_run
//! use chat_fanout::directory::MemoryDirectoryStore;
//! use chat_fanout::resolver::InMemoryMembership;
//! use chat_fanout::session::InMemorySessions;
//! use chat_fanout::{ChatNode, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> chat_fanout::Result<()> {
//!     let config = NodeConfig::default().secret("internal-secret");
//!     let node = ChatNode::new(
//!         config,
//!         InMemoryMembership::new(),
//!         MemoryDirectoryStore::new(),
//!         InMemorySessions::new(),
//!     )?;
//!
//!     node.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod directory;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod http;
pub mod registry;
pub mod resolver;
pub mod secret;
pub mod server;
pub mod session;
pub mod stats;

pub use dispatch::{EventDispatcher, EventQueue};
pub use error::{Error, Result};
pub use event::{Destination, DestinationType, Event, EventKind, UserId};
pub use registry::{ConnectionHandle, ConnectionRegistry, EventFrame};
pub use resolver::{DestinationResolver, MembershipStore};
pub use server::{ChatNode, NodeConfig};
