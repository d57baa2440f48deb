//! Connection lifecycle for one room attempt.
//!
//! All protocol-state mutation in the client goes through these transition
//! functions. The only forward path is NEW → ATTACHED → JOINED → CONNECTED;
//! CLOSED and ERROR absorb every forward transition. Closing is accepted
//! from any state because teardown ends the attempt.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Attached,
    Joined,
    Connected,
    Closed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Attached,
    Joined,
    Connected,
    Closed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub event: LifecycleEvent,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid state transition from {0:?} via {1:?}")]
    InvalidTransition(ConnectionState, LifecycleEvent),
}

/// Tracks the phase of one room connection attempt.
#[derive(Debug, Clone)]
pub struct RoomLifecycle {
    state: ConnectionState,
}

impl RoomLifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::New,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Begin a fresh attempt, discarding whatever the previous one reached.
    pub fn reset(&mut self) {
        self.state = ConnectionState::New;
    }

    pub fn on_attached(&mut self) -> Result<Transition, LifecycleError> {
        match self.state {
            ConnectionState::New => {
                Ok(self.transition(LifecycleEvent::Attached, ConnectionState::Attached))
            }
            _ => Err(LifecycleError::InvalidTransition(
                self.state,
                LifecycleEvent::Attached,
            )),
        }
    }

    pub fn on_joined(&mut self) -> Result<Transition, LifecycleError> {
        match self.state {
            ConnectionState::Attached => {
                Ok(self.transition(LifecycleEvent::Joined, ConnectionState::Joined))
            }
            _ => Err(LifecycleError::InvalidTransition(
                self.state,
                LifecycleEvent::Joined,
            )),
        }
    }

    pub fn on_connected(&mut self) -> Result<Transition, LifecycleError> {
        match self.state {
            ConnectionState::Joined => {
                Ok(self.transition(LifecycleEvent::Connected, ConnectionState::Connected))
            }
            _ => Err(LifecycleError::InvalidTransition(
                self.state,
                LifecycleEvent::Connected,
            )),
        }
    }

    /// Teardown; accepted from every state.
    pub fn on_closed(&mut self) -> Transition {
        self.transition(LifecycleEvent::Closed, ConnectionState::Closed)
    }

    /// Enter the failed state. Refused once the attempt is already over
    /// (CLOSED) or already failed (ERROR), which is what makes error
    /// reporting idempotent at the call site.
    pub fn on_failed(&mut self) -> Result<Transition, LifecycleError> {
        match self.state {
            ConnectionState::Closed | ConnectionState::Error => Err(
                LifecycleError::InvalidTransition(self.state, LifecycleEvent::Failed),
            ),
            _ => Ok(self.transition(LifecycleEvent::Failed, ConnectionState::Error)),
        }
    }

    fn transition(&mut self, event: LifecycleEvent, next: ConnectionState) -> Transition {
        let from = self.state;
        self.state = next;
        Transition {
            from,
            to: next,
            event,
        }
    }
}

impl Default for RoomLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_happy_path() {
        let mut lifecycle = RoomLifecycle::new();
        lifecycle.on_attached().unwrap();
        lifecycle.on_joined().unwrap();
        let transition = lifecycle.on_connected().unwrap();
        assert_eq!(transition.from, ConnectionState::Joined);
        assert_eq!(transition.to, ConnectionState::Connected);
        assert!(lifecycle.is_connected());
    }

    #[test]
    fn join_before_attach_is_invalid() {
        let mut lifecycle = RoomLifecycle::new();
        assert_eq!(
            lifecycle.on_joined().unwrap_err(),
            LifecycleError::InvalidTransition(ConnectionState::New, LifecycleEvent::Joined)
        );
        assert_eq!(lifecycle.state(), ConnectionState::New);
    }

    #[test]
    fn closed_absorbs_forward_transitions() {
        let mut lifecycle = RoomLifecycle::new();
        lifecycle.on_closed();
        assert!(lifecycle.on_attached().is_err());
        assert!(lifecycle.on_failed().is_err());
        assert_eq!(lifecycle.state(), ConnectionState::Closed);
    }

    #[test]
    fn error_is_absorbing_but_can_close() {
        let mut lifecycle = RoomLifecycle::new();
        lifecycle.on_failed().unwrap();
        assert!(lifecycle.on_attached().is_err());
        assert!(lifecycle.on_failed().is_err(), "second failure is absorbed");
        let transition = lifecycle.on_closed();
        assert_eq!(transition.to, ConnectionState::Closed);
    }

    #[test]
    fn reset_starts_a_new_attempt() {
        let mut lifecycle = RoomLifecycle::new();
        lifecycle.on_failed().unwrap();
        lifecycle.reset();
        assert_eq!(lifecycle.state(), ConnectionState::New);
        lifecycle.on_attached().unwrap();
    }
}
