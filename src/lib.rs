//! bit-link
//!
//! Connects to littleBits w30 BLE bits and pushes single-byte control
//! values to them. A [`ConnectionManager`] owns one record per caller
//! chosen label and drives each through discovery, GATT connection and
//! characteristic acquisition over a pluggable [`BitTransport`].

pub mod config;
pub mod connection;
pub mod transport;

mod sync;

pub use bit_link_shared as shared;
pub use bit_link_shared::{ConnectionSnapshot, ConnectionState, LinkError};
pub use connection::{listener, ConnectionManager, Listener};
pub use transport::{BitTransport, BluetoothTransport, SimulatedTransport};
