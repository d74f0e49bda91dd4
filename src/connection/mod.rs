//! Connection management for labelled bit links
//!
//! This module handles:
//! - The label → record registry and its public API
//! - The discovery → GATT → characteristic lifecycle per label
//! - Broadcasting snapshots to subscribers on every change

mod broadcast;
mod lifecycle;
mod manager;
mod record;

#[cfg(test)]
mod test_support;

pub use broadcast::{listener, Broadcaster, Listener};
pub use manager::ConnectionManager;
