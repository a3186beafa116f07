//! Node discovery
//!
//! Node processes record themselves in a shared key-value store so that a
//! front-end or load balancer can find which nodes currently accept
//! connections. The directory is independent of the event path.
//!
//! ```text
//!  Unregistered ──register──► Registered+Available ──update──► Registered
//!       ▲                              │                            │
//!       └──────── unregister / reaper eviction ◄────────────────────┘
//! ```
//!
//! Only a fresh `register` on an unregistered id re-enters the available
//! state.

pub mod error;
pub mod node;
pub mod reaper;
pub mod store;

pub use error::{DirectoryError, ProbeError, StoreError};
pub use node::{address_key, available_key, NodeDirectory, NodeId, NodeRecord};
pub use reaper::{LivenessProbe, NodeReaper, ReapReport, ReaperConfig, TcpProbe};
pub use store::{DirectoryStore, MemoryDirectoryStore};
