//! Connection registry for live event delivery
//!
//! The registry tracks which users hold a live connection on this node and
//! hands the dispatcher a snapshot of handles to push frames to.
//!
//! # Architecture
//!
//! ```text
//!                    Arc<ConnectionRegistry<H>>
//!                   ┌──────────────────────────┐
//!                   │ connections: HashMap<    │
//!                   │   UserId,                │
//!                   │   ConnectionEntry {      │
//!                   │     id, handle: H,       │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Session]               [Session]             [EventDispatcher]
//!   register()              unregister()          resolve_live()
//!                                                        │
//!                                 handle.send(frame) ◄───┘
//! ```
//!
//! # Shared frames
//!
//! An event is serialized once into an [`EventFrame`]; every recipient gets a
//! clone that shares the same text allocation.

pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use entry::{ChannelHandle, ConnectionEntry, ConnectionHandle, ConnectionId};
pub use error::DeliveryError;
pub use frame::EventFrame;
pub use store::ConnectionRegistry;
