//! Bluetooth transport layer using BlueZ GATT

use crate::sync::lock;
use crate::transport::discovery::{BitDiscovery, DiscoveryConfig};
use crate::transport::traits::{
    BitCharacteristic, BitDevice, BitTransport, DisconnectCallback, GattServer, GattService,
};
use async_trait::async_trait;
use bit_link_shared::{LinkError, Uuid};
use bluer::gatt::remote::{Characteristic, Service};
use bluer::{Device, DeviceEvent, DeviceProperty};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often to poll BlueZ while it resolves GATT services
const SERVICES_RESOLVE_POLL: Duration = Duration::from_millis(100);

/// Polls before giving up on service resolution
const SERVICES_RESOLVE_ATTEMPTS: u32 = 50;

/// How long disconnect watchers may keep running after a requested disconnect
const DISCONNECT_EVENT_GRACE: Duration = Duration::from_secs(2);

/// Event-watching tasks owned by one device
///
/// Dropping the set aborts every task still running, so a device whose
/// link never came up does not leave its event stream behind.
#[derive(Default)]
struct Watchers(Mutex<Vec<JoinHandle<()>>>);

impl Watchers {
    fn push(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.0);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Move the running tasks into a new set
    fn take(&self) -> Watchers {
        Watchers(Mutex::new(std::mem::take(&mut *lock(&self.0))))
    }

    /// Wait up to `grace` for the tasks to finish, then abort the rest
    async fn settle(self, grace: Duration) {
        let tasks: Vec<JoinHandle<()>> = lock(&self.0).drain(..).collect();
        let deadline = tokio::time::Instant::now() + grace;
        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
            }
        }
    }
}

impl Drop for Watchers {
    fn drop(&mut self) {
        for task in lock(&self.0).drain(..) {
            task.abort();
        }
    }
}

/// Bluetooth transport backed by the default BlueZ adapter
pub struct BluetoothTransport {
    discovery: DiscoveryConfig,
}

impl BluetoothTransport {
    /// Create a new Bluetooth transport
    pub fn new(discovery: DiscoveryConfig) -> Self {
        Self { discovery }
    }
}

#[async_trait]
impl BitTransport for BluetoothTransport {
    async fn is_available(&self) -> bool {
        match BitDiscovery::get_adapter().await {
            Ok(adapter) => {
                debug!("[BT] Using adapter {}", adapter.name());
                true
            }
            Err(e) => {
                warn!("[BT] No usable adapter: {}", e);
                false
            }
        }
    }

    async fn request_device(&self, service: Uuid) -> Result<Arc<dyn BitDevice>, LinkError> {
        let adapter = BitDiscovery::get_adapter()
            .await
            .map_err(|_| LinkError::CapabilityUnavailable)?;

        let discovery = BitDiscovery::new(self.discovery.clone());
        let device = discovery.find_device(&adapter, service).await?;

        let name = device.name().await.ok().flatten();
        info!(
            "[BT] Selected {} ({})",
            name.as_deref().unwrap_or("<unnamed>"),
            device.address()
        );

        Ok(Arc::new(BluetoothDevice {
            inner: device,
            name,
            runtime: Handle::current(),
            watchers: Watchers::default(),
        }))
    }

    fn name(&self) -> &'static str {
        "Bluetooth"
    }
}

/// BlueZ device wrapper implementing BitDevice
pub struct BluetoothDevice {
    inner: Device,
    name: Option<String>,
    runtime: Handle,
    watchers: Watchers,
}

#[async_trait]
impl BitDevice for BluetoothDevice {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn id(&self) -> String {
        self.inner.address().to_string()
    }

    async fn connect_gatt(&self) -> Result<Box<dyn GattServer>, LinkError> {
        self.inner
            .connect()
            .await
            .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;

        // BlueZ exposes services only once they are resolved
        let mut attempts = 0;
        while !self.inner.is_services_resolved().await.unwrap_or(false) {
            attempts += 1;
            if attempts >= SERVICES_RESOLVE_ATTEMPTS {
                return Err(LinkError::ConnectionFailed(
                    "GATT services were never resolved".into(),
                ));
            }
            tokio::time::sleep(SERVICES_RESOLVE_POLL).await;
        }

        Ok(Box::new(BluetoothGattServer {
            device: self.inner.clone(),
            runtime: self.runtime.clone(),
        }))
    }

    fn on_disconnected(&self, callback: DisconnectCallback) {
        let device = self.inner.clone();
        let task = self.runtime.spawn(async move {
            let events = match device.events().await {
                Ok(events) => events,
                Err(e) => {
                    warn!("[BT] Cannot watch {}: {}", device.address(), e);
                    return;
                }
            };
            tokio::pin!(events);

            while let Some(event) = events.next().await {
                if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                    debug!("[BT] {} reported disconnect", device.address());
                    callback();
                    break;
                }
            }
        });
        self.watchers.push(task);
    }

    fn disconnect(&self) {
        let device = self.inner.clone();
        let watchers = self.watchers.take();
        self.runtime.spawn(async move {
            if let Err(e) = device.disconnect().await {
                warn!("[BT] Disconnect of {} failed: {}", device.address(), e);
            }
            // A link that never came up produces no disconnect event
            watchers.settle(DISCONNECT_EVENT_GRACE).await;
        });
    }
}

struct BluetoothGattServer {
    device: Device,
    runtime: Handle,
}

#[async_trait]
impl GattServer for BluetoothGattServer {
    async fn primary_service(&self, uuid: Uuid) -> Result<Box<dyn GattService>, LinkError> {
        let services = self
            .device
            .services()
            .await
            .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;

        for service in services {
            let matches = service.uuid().await.map(|u| u == uuid).unwrap_or(false);
            if matches && service.primary().await.unwrap_or(false) {
                return Ok(Box::new(BluetoothGattService {
                    inner: service,
                    runtime: self.runtime.clone(),
                }));
            }
        }

        Err(LinkError::ServiceNotFound(uuid))
    }
}

struct BluetoothGattService {
    inner: Service,
    runtime: Handle,
}

#[async_trait]
impl GattService for BluetoothGattService {
    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn BitCharacteristic>, LinkError> {
        let characteristics = self
            .inner
            .characteristics()
            .await
            .map_err(|_| LinkError::CharacteristicNotFound(uuid))?;

        for characteristic in characteristics {
            if characteristic.uuid().await.map(|u| u == uuid).unwrap_or(false) {
                return Ok(Arc::new(BluetoothCharacteristic {
                    inner: characteristic,
                    runtime: self.runtime.clone(),
                }));
            }
        }

        Err(LinkError::CharacteristicNotFound(uuid))
    }
}

struct BluetoothCharacteristic {
    inner: Characteristic,
    runtime: Handle,
}

impl BitCharacteristic for BluetoothCharacteristic {
    fn write(&self, payload: Bytes) {
        let characteristic = self.inner.clone();
        self.runtime.spawn(async move {
            if let Err(e) = characteristic.write(&payload).await {
                warn!("[BT] Write failed: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::oneshot;

    #[test]
    fn test_transport_name() {
        let transport = BluetoothTransport::new(DiscoveryConfig::default());
        assert_eq!(transport.name(), "Bluetooth");
    }

    /// Task that never finishes; `rx` errors once it is aborted
    fn stuck_task() -> (JoinHandle<()>, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        (task, rx)
    }

    #[tokio::test]
    async fn test_watchers_abort_on_drop() {
        let watchers = Watchers::default();
        let (task, rx) = stuck_task();
        watchers.push(task);

        drop(watchers);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_settle_lets_pending_event_through() {
        let watchers = Watchers::default();
        let (tx, rx) = oneshot::channel();
        watchers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send("disconnected");
        }));

        watchers.take().settle(Duration::from_secs(1)).await;
        assert_eq!(rx.await.ok(), Some("disconnected"));
    }

    #[tokio::test]
    async fn test_settle_aborts_stuck_watcher() {
        let watchers = Watchers::default();
        let (task, rx) = stuck_task();
        watchers.push(task);

        let taken = watchers.take();
        assert!(lock(&watchers.0).is_empty());

        taken.settle(Duration::from_millis(20)).await;
        assert!(rx.await.is_err());
    }
}
