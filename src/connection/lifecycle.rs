//! Connection lifecycle controller
//!
//! Drives one label from `Pairing` to `Connected`:
//! 1. Capability check
//! 2. Device selection by service filter
//! 3. GATT connect
//! 4. Primary service lookup
//! 5. Characteristic lookup, then the initial write
//!
//! Every step failure lands in [`fail`], which leaves the record
//! `Disconnected` with its error recorded. There is no retry. A
//! `disconnect()` that arrives before `Connected` is picked up after the
//! step in flight and ends the sequence through [`abandon`].

use super::manager::Registry;
use super::record::{ConnectionRecord, RecordHandle};
use crate::sync::lock;
use crate::transport::{BitTransport, DisconnectCallback};
use bit_link_shared::{ConnectionState, LinkError, LinkEvent, BITSNAP_CHAR_UUID, SERVICE_UUID};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// Why a sequence stopped before reaching `Connected`
#[derive(Debug)]
enum Abort {
    /// A step failed
    Failed(LinkError),
    /// `disconnect()` was called while the sequence was running
    Requested,
    /// The link went down mid-sequence and was already reported
    Ended,
}

impl From<LinkError> for Abort {
    fn from(err: LinkError) -> Self {
        Abort::Failed(err)
    }
}

/// Run the connection sequence for `label` against `record`
///
/// `record` is the handle created by the `connect()` that spawned this
/// sequence. If a later `connect()` replaced it, this sequence keeps
/// mutating its own record while notifications go out for whatever the
/// label currently holds.
pub(crate) async fn run(
    registry: Arc<Registry>,
    transport: Arc<dyn BitTransport>,
    label: String,
    record: RecordHandle,
    initial_value: u8,
) {
    let result =
        connect_sequence(&registry, transport.as_ref(), &label, &record, initial_value).await;
    let requested = lock(&record).teardown_requested;

    match result {
        Ok(()) => {}
        Err(Abort::Failed(err)) if requested => {
            debug!("[LINK] {} step failed after disconnect request: {}", label, err);
            abandon(&registry, &label, &record);
        }
        Err(Abort::Failed(err)) => fail(&registry, &label, &record, err),
        Err(Abort::Requested) => abandon(&registry, &label, &record),
        Err(Abort::Ended) => debug!("[LINK] {} sequence stopped after link loss", label),
    }
    lock(&record).sequence_active = false;
}

async fn connect_sequence(
    registry: &Arc<Registry>,
    transport: &dyn BitTransport,
    label: &str,
    record: &RecordHandle,
    initial_value: u8,
) -> Result<(), Abort> {
    if !transport.is_available().await {
        return Err(LinkError::CapabilityUnavailable.into());
    }

    {
        let mut r = lock(record);
        if r.teardown_requested {
            return Err(Abort::Requested);
        }
        r.apply(LinkEvent::ConnectRequested)?;
        r.push_log(format!(
            "Requesting any Bluetooth Device with {}...",
            SERVICE_UUID
        ));
    }
    registry.notify(label);

    let device = transport.request_device(SERVICE_UUID).await?;

    {
        let mut r = lock(record);
        if let Err(abort) = checkpoint(&r) {
            drop(r);
            device.disconnect();
            return Err(abort);
        }
        r.apply(LinkEvent::DeviceSelected)?;
        r.name = device.name();
        r.id = Some(device.id());
        r.device = Some(device.clone());
        let line = format!(
            "Found {} ({}). Connecting to GATT Server...",
            r.name.as_deref().unwrap_or("unnamed device"),
            device.id()
        );
        r.push_log(line);
    }
    registry.notify(label);

    device.on_disconnected(link_lost_callback(registry, label, record));

    let server = device.connect_gatt().await?;
    checkpoint(&lock(record))?;
    log_step(registry, label, record, format!("Getting service {}...", SERVICE_UUID));

    let service = server.primary_service(SERVICE_UUID).await?;
    checkpoint(&lock(record))?;
    log_step(
        registry,
        label,
        record,
        format!("Getting characteristic {}...", BITSNAP_CHAR_UUID),
    );

    let characteristic = service.characteristic(BITSNAP_CHAR_UUID).await?;

    {
        let mut r = lock(record);
        checkpoint(&r)?;
        r.apply(LinkEvent::CharacteristicAcquired)?;
        r.connected = true;
        r.characteristic = Some(characteristic);
        r.push_log("Connected!");
    }
    info!("[LINK] {} connected via {}", label, transport.name());
    registry.notify(label);

    registry.write(label, initial_value);
    Ok(())
}

/// Decide whether the sequence may take its next step
fn checkpoint(r: &ConnectionRecord) -> Result<(), Abort> {
    if r.teardown_requested {
        Err(Abort::Requested)
    } else if r.state() == ConnectionState::Disconnected {
        Err(Abort::Ended)
    } else {
        Ok(())
    }
}

fn log_step(registry: &Registry, label: &str, record: &RecordHandle, line: String) {
    lock(record).push_log(line);
    registry.notify(label);
}

/// Funnel for every step failure
fn fail(registry: &Registry, label: &str, record: &RecordHandle, err: LinkError) {
    warn!("[LINK] {} failed: {}", label, err);

    let device = {
        let mut r = lock(record);
        r.fsm.process_event(LinkEvent::StepFailed);
        r.error = Some(err.to_string());
        let device = r.release();
        if device.is_some() {
            r.teardown_requested = true;
        }
        r.push_log(format!("Error! {}", err));
        device
    };
    registry.notify(label);

    // Release platform resources; the resulting disconnect is expected
    if let Some(device) = device {
        device.disconnect();
    }
}

/// End a sequence whose label was disconnected before reaching `Connected`
fn abandon(registry: &Registry, label: &str, record: &RecordHandle) {
    let device = {
        let mut r = lock(record);
        r.teardown_requested = false;
        r.fsm.process_event(LinkEvent::DisconnectRequested);
        let device = r.release();
        r.push_log("Disconnected from server.");
        device
    };
    info!("[LINK] {} disconnected before the link was up", label);
    registry.notify(label);

    // The record no longer holds the device, so a late link-lost event is ignored
    if let Some(device) = device {
        device.disconnect();
    }
}

/// Build the callback the device fires when its link goes down
///
/// Holds weak references only: the record owns the device, which owns
/// this callback.
fn link_lost_callback(
    registry: &Arc<Registry>,
    label: &str,
    record: &RecordHandle,
) -> DisconnectCallback {
    let registry = Arc::downgrade(registry);
    let record = Arc::downgrade(record);
    let label = label.to_owned();

    Arc::new(move || on_link_lost(&registry, &label, &record))
}

fn on_link_lost(registry: &Weak<Registry>, label: &str, record: &Weak<Mutex<ConnectionRecord>>) {
    let (Some(registry), Some(record)) = (registry.upgrade(), record.upgrade()) else {
        return;
    };

    {
        let mut r = lock(&record);
        let requested = std::mem::take(&mut r.teardown_requested);
        if requested {
            r.fsm.process_event(LinkEvent::DisconnectRequested);
            info!("[LINK] {} disconnected", label);
        } else if r.device.is_none() {
            debug!("[LINK] {} link-lost event after teardown ignored", label);
            return;
        } else {
            r.fsm.process_event(LinkEvent::PeerDisconnected);
            r.error = Some(LinkError::UnsolicitedDisconnect.to_string());
            warn!("[LINK] {} lost its peripheral", label);
        }
        r.release();
        r.push_log("Disconnected from server.");
    }
    registry.notify(label);
}
