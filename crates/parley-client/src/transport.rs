//! The gateway transport port.

use async_trait::async_trait;

use janus_proto::{Envelope, HandleId, OutboundRequest, ServerInfo, SessionId};

use crate::calls::CallHandle;
use crate::error::Result;

/// Endpoint addressing for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The gateway root (session creation).
    Server,
    /// A live session (destroy, keepalive, long-poll).
    Session(SessionId),
    /// A plugin handle within a session (plugin messages, trickle, detach).
    Handle(SessionId, HandleId),
}

/// Issues typed gateway calls.
///
/// Implementations must race every call against `call.cancelled()` and
/// resolve cancellation as [`crate::SignalError::Cancelled`] promptly,
/// even while the request is on the wire. Cancelling a call that already
/// completed has no effect.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the gateway descriptor.
    async fn server_info(&self, call: &CallHandle) -> Result<ServerInfo>;

    /// Issue one request and decode the inline response envelope.
    async fn request(
        &self,
        scope: Scope,
        request: &OutboundRequest,
        call: &CallHandle,
    ) -> Result<Envelope>;

    /// Issue one long-poll and decode whatever frame the gateway releases.
    /// The gateway holds the request open for a bounded interval and
    /// answers `keepalive` when nothing happened; that is not a failure.
    async fn poll_event(&self, session: SessionId, call: &CallHandle) -> Result<Envelope>;
}
