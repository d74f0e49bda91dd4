//! Per-label connection record

use crate::transport::{BitCharacteristic, BitDevice};
use bit_link_shared::{
    ConnectionSnapshot, ConnectionState, LinkError, LinkEvent, LinkStateMachine, TransitionResult,
};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Shared handle to a record; an in-flight sequence keeps its own handle
pub(crate) type RecordHandle = Arc<Mutex<ConnectionRecord>>;

/// Mutable state behind one label
pub(crate) struct ConnectionRecord {
    pub label: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub log: Vec<String>,
    pub fsm: LinkStateMachine,
    pub connected: bool,
    pub error: Option<String>,
    pub device: Option<Arc<dyn BitDevice>>,
    pub characteristic: Option<Arc<dyn BitCharacteristic>>,
    /// Set when we asked the device to drop, so its disconnect is expected
    pub teardown_requested: bool,
    /// True while a connect sequence is driving this record
    pub sequence_active: bool,
}

impl ConnectionRecord {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            name: None,
            id: None,
            log: Vec::new(),
            fsm: LinkStateMachine::new(),
            connected: false,
            error: None,
            device: None,
            characteristic: None,
            teardown_requested: false,
            sequence_active: false,
        }
    }

    pub fn handle(label: &str) -> RecordHandle {
        Arc::new(Mutex::new(Self::new(label)))
    }

    pub fn state(&self) -> ConnectionState {
        self.fsm.state()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            name: self.name.clone(),
            id: self.id.clone(),
            log: self.log.clone(),
            state: self.state(),
            connected: self.connected,
            error: self.error.clone(),
        }
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!("[LINK] {}: {}", self.label, line);
        self.log.push(line);
    }

    /// Drive the state machine, rejecting transitions it does not allow
    pub fn apply(&mut self, event: LinkEvent) -> Result<ConnectionState, LinkError> {
        match self.fsm.process_event(event) {
            TransitionResult::Success(state) => Ok(state),
            TransitionResult::Invalid { from, event } => {
                Err(LinkError::InvalidTransition { from, event })
            }
        }
    }

    /// Whether `disconnect()` has anything to tear down
    pub fn accepts_disconnect(&self) -> bool {
        self.device.is_some() || self.sequence_active
    }

    /// Drop the characteristic and hand back the device for teardown
    pub fn release(&mut self) -> Option<Arc<dyn BitDevice>> {
        self.connected = false;
        self.characteristic = None;
        self.device.take()
    }
}
