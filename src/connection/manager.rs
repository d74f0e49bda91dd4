//! Connection registry: label → record, plus the public API

use super::broadcast::{Broadcaster, Listener};
use super::lifecycle;
use super::record::{ConnectionRecord, RecordHandle};
use crate::sync::lock;
use crate::transport::BitTransport;
use bit_link_shared::{codec, ConnectionSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Shared state behind a [`ConnectionManager`]
///
/// The record map and the listener list are never locked together and
/// never across an `.await`.
#[derive(Default)]
pub(crate) struct Registry {
    records: Mutex<HashMap<String, RecordHandle>>,
    broadcaster: Broadcaster,
}

impl Registry {
    fn record(&self, label: &str) -> Option<RecordHandle> {
        lock(&self.records).get(label).cloned()
    }

    fn replace(&self, label: &str, record: RecordHandle) {
        lock(&self.records).insert(label.to_owned(), record);
    }

    fn snapshot(&self, label: &str) -> ConnectionSnapshot {
        match self.record(label) {
            Some(record) => lock(&record).snapshot(),
            None => ConnectionSnapshot::default(),
        }
    }

    /// Broadcast the current snapshot for `label`
    pub(crate) fn notify(&self, label: &str) {
        let snapshot = self.snapshot(label);
        self.broadcaster.emit(label, &snapshot);
    }

    /// Send `value` if `label` is connected, otherwise do nothing
    pub(crate) fn write(&self, label: &str, value: u8) {
        let Some(record) = self.record(label) else {
            return;
        };

        let characteristic = {
            let mut r = lock(&record);
            if !r.connected {
                return;
            }
            r.push_log(format!("Writing value {}", value));
            r.characteristic.clone()
        };
        self.notify(label);

        if let Some(characteristic) = characteristic {
            characteristic.write(codec::encode(value));
        }
    }
}

/// Owns every labelled connection and its subscribers
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct ConnectionManager {
    registry: Arc<Registry>,
    transport: Arc<dyn BitTransport>,
    runtime: Handle,
}

impl ConnectionManager {
    /// Create a manager driving `transport` on the current Tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; use
    /// [`with_runtime`](Self::with_runtime) there.
    pub fn new(transport: Arc<dyn BitTransport>) -> Self {
        Self::with_runtime(transport, Handle::current())
    }

    /// Create a manager whose sequences run on `runtime`
    pub fn with_runtime(transport: Arc<dyn BitTransport>, runtime: Handle) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            transport,
            runtime,
        }
    }

    /// Reset the record for `label` and start connecting in the background
    ///
    /// Callable from any thread. Returns immediately; progress is
    /// observable through [`get_state`](Self::get_state) and listeners.
    /// A sequence already running for `label` is not cancelled.
    pub fn connect(&self, label: &str, initial_value: u8) {
        info!(
            "[LINK] Connecting {} via {} (initial value {})",
            label,
            self.transport.name(),
            initial_value
        );

        let record = ConnectionRecord::handle(label);
        lock(&record).sequence_active = true;
        self.registry.replace(label, record.clone());
        self.registry.notify(label);

        self.runtime.spawn(lifecycle::run(
            self.registry.clone(),
            self.transport.clone(),
            label.to_owned(),
            record,
            initial_value,
        ));
    }

    /// Ask the device behind `label` to disconnect
    ///
    /// A connected label goes `Disconnected` through the device's
    /// disconnect event. A label still pairing or connecting stops after
    /// the step in flight. Unknown and already disconnected labels are
    /// ignored.
    pub fn disconnect(&self, label: &str) {
        let Some(record) = self.registry.record(label) else {
            return;
        };

        let device = {
            let mut r = lock(&record);
            if !r.accepts_disconnect() {
                return;
            }
            r.teardown_requested = true;
            r.device.clone()
        };

        debug!("[LINK] Disconnect requested for {}", label);
        if let Some(device) = device {
            device.disconnect();
        }
    }

    /// Snapshot of `label`; unknown labels read as a fresh disconnected record
    pub fn get_state(&self, label: &str) -> ConnectionSnapshot {
        self.registry.snapshot(label)
    }

    /// Send `value` to the bit behind `label` if it is connected
    pub fn write(&self, label: &str, value: u8) {
        self.registry.write(label, value);
    }

    pub fn subscribe(&self, listener: Listener) {
        self.registry.broadcaster.subscribe(listener);
    }

    /// Remove the first subscription of `listener`
    pub fn unsubscribe(&self, listener: &Listener) -> bool {
        self.registry.broadcaster.unsubscribe(listener)
    }

    /// Every label with a record, sorted
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = lock(&self.registry.records).keys().cloned().collect();
        labels.sort();
        labels
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    #[cfg(test)]
    pub(crate) fn registry_has_no_handles(&self, label: &str) -> bool {
        match self.registry.record(label) {
            Some(record) => {
                let r = lock(&record);
                r.device.is_none() && r.characteristic.is_none()
            }
            None => true,
        }
    }
}
