//! Dispatch statistics

pub mod metrics;

pub use metrics::{DispatchSnapshot, DispatchStats};
