//! Error taxonomy for the connection lifecycle

use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::{ConnectionState, LinkEvent};

/// Every way a connection sequence can end without a usable characteristic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Bluetooth is not supported on this device.")]
    CapabilityUnavailable,

    #[error("User cancelled the requestDevice() chooser.")]
    UserCancelled,

    #[error("No bit device found advertising the control service.")]
    DeviceNotFound,

    #[error("GATT connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Primary service {0} not found on device.")]
    ServiceNotFound(Uuid),

    #[error("Characteristic {0} not found on service.")]
    CharacteristicNotFound(Uuid),

    #[error("Device disconnected unexpectedly.")]
    UnsolicitedDisconnect,

    #[error("Connection sequence interrupted: {from} cannot accept {event}")]
    InvalidTransition {
        from: ConnectionState,
        event: LinkEvent,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SERVICE_UUID;

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(
            LinkError::CapabilityUnavailable.to_string(),
            "Bluetooth is not supported on this device."
        );
        assert_eq!(
            LinkError::ServiceNotFound(SERVICE_UUID).to_string(),
            "Primary service 0705d0c0-c8d8-41c9-ae15-52fad5358b8a not found on device."
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = LinkError::InvalidTransition {
            from: ConnectionState::Disconnected,
            event: LinkEvent::CharacteristicAcquired,
        };
        assert_eq!(
            err.to_string(),
            "Connection sequence interrupted: Disconnected cannot accept CharacteristicAcquired"
        );
    }
}
