//! w30 Bit Shared Protocol Types
//!
//! This crate provides the fixed GATT identifiers, the control-point payload
//! codec and the connection state machine shared by every bit-link
//! transport.

pub mod codec;
pub mod error;
pub mod state_machine;

pub use error::LinkError;
pub use state_machine::{ConnectionState, LinkEvent, LinkStateMachine, TransitionResult};
pub use uuid::Uuid;

/// Primary service advertised by the bit
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0705d0c0_c8d8_41c9_ae15_52fad5358b8a);

/// Writable control point carrying the output value
pub const BITSNAP_CHAR_UUID: Uuid = Uuid::from_u128(0x0705d0c2_c8d8_41c9_ae15_52fad5358b8a);

/// Device settings characteristic (not driven by this crate)
pub const SETTINGS_CHAR_UUID: Uuid = Uuid::from_u128(0x0705d0c3_c8d8_41c9_ae15_52fad5358b8a);

/// Sequencer characteristic (not driven by this crate)
pub const SEQUENCER_CHAR_UUID: Uuid = Uuid::from_u128(0x0705d0c5_c8d8_41c9_ae15_52fad5358b8a);

/// Immutable copy of a connection record's observable fields
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
    /// Peripheral-reported name
    pub name: Option<String>,
    /// Peripheral-reported identifier
    pub id: Option<String>,
    /// Every log line since the record was created
    pub log: Vec<String>,
    pub state: ConnectionState,
    /// True only while the characteristic is held
    pub connected: bool,
    /// Description of the last failure
    pub error: Option<String>,
}

impl ConnectionSnapshot {
    /// Most recent log line, if any
    pub fn last_log(&self) -> Option<&str> {
        self.log.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_strings() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "0705d0c0-c8d8-41c9-ae15-52fad5358b8a"
        );
        assert_eq!(
            BITSNAP_CHAR_UUID.to_string(),
            "0705d0c2-c8d8-41c9-ae15-52fad5358b8a"
        );
    }

    #[test]
    fn test_default_snapshot() {
        let snapshot = ConnectionSnapshot::default();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert!(!snapshot.connected);
        assert!(snapshot.log.is_empty());
        assert!(snapshot.name.is_none());
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.last_log(), None);
    }
}
