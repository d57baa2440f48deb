//! Client error taxonomy.

use std::time::Duration;

use janus_proto::{ConnectionState, LifecycleError, ProtocolError};

/// Result type alias using the client's error type.
pub type Result<T> = std::result::Result<T, SignalError>;

/// Everything that can go wrong while driving the signaling channel.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Network, IO or HTTP-level failure from the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The in-flight call was cancelled, normally during shutdown.
    #[error("request cancelled")]
    Cancelled,

    /// The gateway answered with something the protocol does not allow here.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lifecycle transition was driven out of order.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// An operation arrived in a state that forbids it.
    #[error("{op} refused in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: ConnectionState,
    },

    /// The event drain bound elapsed without a genuine event.
    #[error("no event within {0:?}")]
    EventTimeout(Duration),
}

impl SignalError {
    /// Build a transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    /// True when the failure is the cancellation itself, as opposed to a
    /// fault the user should hear about.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for refusals that abort one call without failing the channel.
    pub fn is_state_violation(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}
