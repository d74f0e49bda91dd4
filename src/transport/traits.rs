//! Transport trait abstraction for pluggable Bluetooth backends
//!
//! The lifecycle controller is written once against these traits. Each
//! level of the GATT hierarchy is its own object so a backend can hand out
//! handles as soon as the platform resolves them.

use async_trait::async_trait;
use bit_link_shared::{LinkError, Uuid};
use bytes::Bytes;
use std::sync::Arc;

/// Invoked once when the platform reports the device link as gone
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Entry point into a Bluetooth stack
#[async_trait]
pub trait BitTransport: Send + Sync {
    /// Whether the host has any Bluetooth capability at all
    async fn is_available(&self) -> bool;

    /// Select a device advertising `service`
    async fn request_device(&self, service: Uuid) -> Result<Arc<dyn BitDevice>, LinkError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// A selected peripheral
#[async_trait]
pub trait BitDevice: Send + Sync {
    /// Peripheral-reported name
    fn name(&self) -> Option<String>;

    /// Platform identifier for the peripheral
    fn id(&self) -> String;

    /// Open the GATT connection
    async fn connect_gatt(&self) -> Result<Box<dyn GattServer>, LinkError>;

    /// Register a callback for platform-reported disconnects
    fn on_disconnected(&self, callback: DisconnectCallback);

    /// Drop the link; registered callbacks fire if it was up
    fn disconnect(&self);
}

/// A connected GATT server
#[async_trait]
pub trait GattServer: Send + Sync {
    async fn primary_service(&self, uuid: Uuid) -> Result<Box<dyn GattService>, LinkError>;
}

/// A resolved primary service
#[async_trait]
pub trait GattService: Send + Sync {
    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn BitCharacteristic>, LinkError>;
}

/// The writable control point
pub trait BitCharacteristic: Send + Sync {
    /// Fire-and-forget write
    fn write(&self, payload: Bytes);
}
