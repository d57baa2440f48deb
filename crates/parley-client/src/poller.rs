//! Long-poll draining.
//!
//! The gateway acknowledges a request inline and delivers its real result
//! later on the session's event endpoint, interleaved with acks and
//! keepalives. `await_event` is the one cancellable primitive every call
//! site uses to wait past those control frames; `run_background` is the
//! same loop kept alive to deliver peer-originated frames (remote ICE
//! candidates) while nothing is blocking on a result.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use janus_proto::{Envelope, EventFrame, ProtocolError, SessionId, TricklePayload};

use crate::calls::{CallRegistry, CallSlot};
use crate::error::{Result, SignalError};
use crate::transport::Transport;
use crate::types::SignalingEvents;

/// Drains the session's event channel.
pub struct EventPoller {
    transport: Arc<dyn Transport>,
    registry: Arc<CallRegistry>,
    wait_bound: Duration,
}

impl EventPoller {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<CallRegistry>,
        wait_bound: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            wait_bound,
        }
    }

    /// Block until a genuine `event` frame arrives for `session`.
    ///
    /// Acks and keepalives re-arm the poll; any other frame is a protocol
    /// error. Each poll is tracked on `slot` so an external cancel unwinds
    /// the drain promptly. The whole drain is bounded by the configured
    /// maximum wait.
    pub async fn await_event(&self, session: SessionId, slot: CallSlot) -> Result<EventFrame> {
        let drain = async {
            loop {
                let call = self.registry.begin(slot);
                let polled = self.transport.poll_event(session, &call).await;
                self.registry.finish(slot, &call);
                match polled? {
                    Envelope::Ack { .. } | Envelope::Keepalive => continue,
                    Envelope::Event(frame) => return Ok(frame),
                    Envelope::Error { error, .. } => {
                        return Err(ProtocolError::Gateway {
                            code: error.code,
                            reason: error.reason,
                        }
                        .into())
                    }
                    other => {
                        return Err(ProtocolError::Unexpected {
                            expected: "event",
                            got: other.kind(),
                        }
                        .into())
                    }
                }
            }
        };
        match tokio::time::timeout(self.wait_bound, drain).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::EventTimeout(self.wait_bound)),
        }
    }

    /// Continuously drain `session` on the long-poll slot, delivering
    /// remote candidates (and any stray remote description) to `events`.
    ///
    /// Returns `Ok(())` once the outstanding poll is cancelled — the
    /// normal shutdown path — and `Err` on transport or protocol faults.
    pub async fn run_background(
        &self,
        session: SessionId,
        events: Arc<dyn SignalingEvents>,
    ) -> Result<()> {
        loop {
            let call = self.registry.begin(CallSlot::LongPoll);
            let polled = self.transport.poll_event(session, &call).await;
            self.registry.finish(CallSlot::LongPoll, &call);
            match polled {
                Ok(Envelope::Ack { .. }) | Ok(Envelope::Keepalive) => continue,
                Ok(Envelope::Trickle { candidate, .. }) => match candidate {
                    TricklePayload::Candidate(candidate) => {
                        events.on_remote_ice_candidate(&candidate)
                    }
                    TricklePayload::Completed { .. } => {
                        debug!(session, "remote end of candidates")
                    }
                },
                Ok(Envelope::Event(frame)) => {
                    debug!(session, sender = ?frame.sender, "room event");
                    if let Some(jsep) = frame.jsep {
                        events.on_remote_description(&jsep);
                    }
                }
                Ok(Envelope::Error { error, .. }) => {
                    return Err(ProtocolError::Gateway {
                        code: error.code,
                        reason: error.reason,
                    }
                    .into())
                }
                Ok(other) => {
                    return Err(ProtocolError::Unexpected {
                        expected: "event",
                        got: other.kind(),
                    }
                    .into())
                }
                Err(err) if err.is_cancelled() => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    /// Cancel the outstanding background poll, if any.
    pub fn stop(&self) {
        self.registry.cancel(CallSlot::LongPoll);
    }
}
