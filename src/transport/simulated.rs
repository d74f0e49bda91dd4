//! Simulated transport for running without hardware
//!
//! Device selection succeeds after a fixed delay and fabricates a
//! `dummy-<id>` peripheral. Writes are recorded instead of sent. Any step
//! can be configured to fail so the failure paths can be exercised.

use crate::sync::lock;
use crate::transport::traits::{
    BitCharacteristic, BitDevice, BitTransport, DisconnectCallback, GattServer, GattService,
};
use async_trait::async_trait;
use bit_link_shared::{codec, LinkError, Uuid, BITSNAP_CHAR_UUID, SERVICE_UUID};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Step at which the simulated stack should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFailure {
    UserCancelled,
    DeviceNotFound,
    GattConnect,
    ServiceLookup,
    CharacteristicLookup,
}

/// Configuration for the simulated transport
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Delay before device selection completes
    pub delay: Duration,
    /// Report Bluetooth capability as present
    pub available: bool,
    /// Inject a failure at one step
    pub failure: Option<SimulatedFailure>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            available: true,
            failure: None,
        }
    }
}

type WriteLog = Arc<Mutex<Vec<Bytes>>>;

/// Transport that fabricates a successful connection
pub struct SimulatedTransport {
    config: SimulatedConfig,
    writes: WriteLog,
    devices: Mutex<Vec<Arc<SimulatedDevice>>>,
    next_id: AtomicU64,
}

impl SimulatedTransport {
    /// Create a new simulated transport
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            writes: Arc::new(Mutex::new(Vec::new())),
            devices: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a transport that connects after `delay`
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(SimulatedConfig {
            delay,
            ..Default::default()
        })
    }

    /// Every payload written so far, in order
    pub fn writes(&self) -> Vec<Bytes> {
        lock(&self.writes).clone()
    }

    /// Decoded values of every well-formed payload written so far
    pub fn written_values(&self) -> Vec<u8> {
        lock(&self.writes)
            .iter()
            .filter_map(|payload| codec::decode(payload).ok())
            .collect()
    }

    /// Simulate every selected peripheral losing power
    pub fn power_off(&self) {
        let devices = lock(&self.devices).clone();
        for device in devices {
            device.drop_link();
        }
    }
}

#[async_trait]
impl BitTransport for SimulatedTransport {
    async fn is_available(&self) -> bool {
        self.config.available
    }

    async fn request_device(&self, service: Uuid) -> Result<Arc<dyn BitDevice>, LinkError> {
        debug!("[SIM] Selecting device for {}", service);
        tokio::time::sleep(self.config.delay).await;

        match self.config.failure {
            Some(SimulatedFailure::UserCancelled) => return Err(LinkError::UserCancelled),
            Some(SimulatedFailure::DeviceNotFound) => return Err(LinkError::DeviceNotFound),
            _ => {}
        }

        let id = format!("{:05x}", self.next_id.fetch_add(1, Ordering::SeqCst));
        info!("[SIM] Fabricated device dummy-{}", id);

        let device = Arc::new(SimulatedDevice {
            name: format!("dummy-{}", id),
            id,
            failure: self.config.failure,
            writes: self.writes.clone(),
            gatt_connected: AtomicBool::new(false),
            callbacks: Mutex::new(Vec::new()),
        });
        lock(&self.devices).push(device.clone());

        Ok(device)
    }

    fn name(&self) -> &'static str {
        "Simulated"
    }
}

/// Fabricated peripheral
pub struct SimulatedDevice {
    name: String,
    id: String,
    failure: Option<SimulatedFailure>,
    writes: WriteLog,
    gatt_connected: AtomicBool,
    callbacks: Mutex<Vec<DisconnectCallback>>,
}

impl SimulatedDevice {
    /// Tear the link down, notifying listeners if it was up
    fn drop_link(&self) {
        if !self.gatt_connected.swap(false, Ordering::SeqCst) {
            return;
        }

        debug!("[SIM] {} link dropped", self.name);
        let callbacks = lock(&self.callbacks).clone();
        for callback in callbacks {
            callback();
        }
    }
}

#[async_trait]
impl BitDevice for SimulatedDevice {
    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    async fn connect_gatt(&self) -> Result<Box<dyn GattServer>, LinkError> {
        if self.failure == Some(SimulatedFailure::GattConnect) {
            return Err(LinkError::ConnectionFailed("simulated GATT failure".into()));
        }

        self.gatt_connected.store(true, Ordering::SeqCst);
        Ok(Box::new(SimulatedServer {
            failure: self.failure,
            writes: self.writes.clone(),
        }))
    }

    fn on_disconnected(&self, callback: DisconnectCallback) {
        lock(&self.callbacks).push(callback);
    }

    fn disconnect(&self) {
        self.drop_link();
    }
}

struct SimulatedServer {
    failure: Option<SimulatedFailure>,
    writes: WriteLog,
}

#[async_trait]
impl GattServer for SimulatedServer {
    async fn primary_service(&self, uuid: Uuid) -> Result<Box<dyn GattService>, LinkError> {
        if uuid != SERVICE_UUID || self.failure == Some(SimulatedFailure::ServiceLookup) {
            return Err(LinkError::ServiceNotFound(uuid));
        }

        Ok(Box::new(SimulatedService {
            failure: self.failure,
            writes: self.writes.clone(),
        }))
    }
}

struct SimulatedService {
    failure: Option<SimulatedFailure>,
    writes: WriteLog,
}

#[async_trait]
impl GattService for SimulatedService {
    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn BitCharacteristic>, LinkError> {
        if uuid != BITSNAP_CHAR_UUID || self.failure == Some(SimulatedFailure::CharacteristicLookup)
        {
            return Err(LinkError::CharacteristicNotFound(uuid));
        }

        Ok(Arc::new(SimulatedCharacteristic {
            writes: self.writes.clone(),
        }))
    }
}

struct SimulatedCharacteristic {
    writes: WriteLog,
}

impl BitCharacteristic for SimulatedCharacteristic {
    fn write(&self, payload: Bytes) {
        debug!("[SIM] Write {:02x?}", &payload[..]);
        lock(&self.writes).push(payload);
    }
}
