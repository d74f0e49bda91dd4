//! Connection State Machine
//!
//! Defines the valid lifecycle transitions of a single bit connection.

use std::fmt;

/// Lifecycle state of one labelled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No link; initial and terminal state
    #[default]
    Disconnected,
    /// Waiting for the platform to select a device
    Pairing,
    /// Device selected, acquiring the GATT characteristic
    Connecting,
    /// Characteristic acquired, writes are delivered
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Pairing => "Pairing",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Caller asked for a connection
    ConnectRequested,
    /// Platform device selection succeeded
    DeviceSelected,
    /// GATT connect, service and characteristic lookup all succeeded
    CharacteristicAcquired,
    /// A step of the connection sequence failed
    StepFailed,
    /// Caller asked for teardown
    DisconnectRequested,
    /// The platform reported the link as gone
    PeerDisconnected,
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(ConnectionState),
    /// Transition was invalid from current state
    Invalid {
        from: ConnectionState,
        event: LinkEvent,
    },
}

/// Per-label lifecycle state machine
#[derive(Debug, Default)]
pub struct LinkStateMachine {
    current_state: ConnectionState,
}

impl LinkStateMachine {
    /// Create a new state machine in Disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.current_state
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LinkEvent) -> TransitionResult {
        match self.next_state(event) {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    fn next_state(&self, event: LinkEvent) -> Option<ConnectionState> {
        use ConnectionState::*;
        use LinkEvent::*;

        match (self.current_state, event) {
            // Teardown is accepted from anywhere
            (_, StepFailed | DisconnectRequested | PeerDisconnected) => Some(Disconnected),

            (Disconnected, ConnectRequested) => Some(Pairing),
            (Pairing, DeviceSelected) => Some(Connecting),
            (Connecting, CharacteristicAcquired) => Some(Connected),

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = LinkStateMachine::new();
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_normal_connection_flow() {
        let mut fsm = LinkStateMachine::new();

        let result = fsm.process_event(LinkEvent::ConnectRequested);
        assert_eq!(result, TransitionResult::Success(ConnectionState::Pairing));

        let result = fsm.process_event(LinkEvent::DeviceSelected);
        assert_eq!(result, TransitionResult::Success(ConnectionState::Connecting));

        let result = fsm.process_event(LinkEvent::CharacteristicAcquired);
        assert_eq!(result, TransitionResult::Success(ConnectionState::Connected));

        let result = fsm.process_event(LinkEvent::DisconnectRequested);
        assert_eq!(
            result,
            TransitionResult::Success(ConnectionState::Disconnected)
        );
    }

    #[test]
    fn test_failure_from_any_state() {
        for steps in 0..=3 {
            let mut fsm = LinkStateMachine::new();
            let path = [
                LinkEvent::ConnectRequested,
                LinkEvent::DeviceSelected,
                LinkEvent::CharacteristicAcquired,
            ];
            for event in path.iter().take(steps) {
                fsm.process_event(*event);
            }

            let result = fsm.process_event(LinkEvent::StepFailed);
            assert_eq!(
                result,
                TransitionResult::Success(ConnectionState::Disconnected)
            );
        }
    }

    #[test]
    fn test_peer_disconnect_mid_sequence() {
        let mut fsm = LinkStateMachine::new();
        fsm.process_event(LinkEvent::ConnectRequested);
        fsm.process_event(LinkEvent::DeviceSelected);
        fsm.process_event(LinkEvent::PeerDisconnected);

        // Late characteristic must not revive the link
        let result = fsm.process_event(LinkEvent::CharacteristicAcquired);
        assert_eq!(
            result,
            TransitionResult::Invalid {
                from: ConnectionState::Disconnected,
                event: LinkEvent::CharacteristicAcquired,
            }
        );
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_invalid_transition() {
        let mut fsm = LinkStateMachine::new();

        // Can't skip device selection
        let result = fsm.process_event(LinkEvent::CharacteristicAcquired);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
