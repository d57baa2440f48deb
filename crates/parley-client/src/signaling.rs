//! The serialized signaling worker.
//!
//! Every state transition and every gateway call runs here, in the order
//! the facade enqueued it. The worker is the only mutator of the session,
//! handle, room, and lifecycle; the call registry is the only thing other
//! tasks touch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use janus_proto::{
    Attach, ConnectionState, Create, Destroy, Detach, Envelope, EventFrame, HandleId,
    IceCandidate, Jsep, KeepAlive, MessageBody, OutboundRequest, PluginMessage, ProtocolError,
    RoomLifecycle, SessionId, Trickle,
};

use crate::calls::{CallHandle, CallRegistry, CallSlot};
use crate::error::{Result, SignalError};
use crate::poller::EventPoller;
use crate::transport::{Scope, Transport};
use crate::types::{ClientConfig, RoomConnectParams, RoomParameters, SignalingEvents};

/// One unit of work for the worker.
#[derive(Debug)]
pub(crate) enum Command {
    Connect(RoomConnectParams),
    Offer(String),
    Answer(String),
    Candidate(IceCandidate),
    Disconnect,
    /// Failure marshalled in from a background task.
    Fault(SignalError),
}

/// Room association: created on attach, publisher id filled by the join
/// event.
#[derive(Debug, Clone)]
struct RoomState {
    room: u64,
    publisher_id: Option<u64>,
}

pub(crate) struct SignalingWorker {
    transport: Arc<dyn Transport>,
    events: Arc<dyn SignalingEvents>,
    registry: Arc<CallRegistry>,
    poller: Arc<EventPoller>,
    config: ClientConfig,
    cmd_tx: mpsc::UnboundedSender<Command>,
    closing: Arc<AtomicBool>,
    state_tx: watch::Sender<ConnectionState>,
    lifecycle: RoomLifecycle,
    session: Option<SessionId>,
    handle: Option<HandleId>,
    room: Option<RoomState>,
    params: Option<RoomConnectParams>,
    keepalive: Option<JoinHandle<()>>,
    background: Option<JoinHandle<()>>,
}

impl SignalingWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        events: Arc<dyn SignalingEvents>,
        registry: Arc<CallRegistry>,
        poller: Arc<EventPoller>,
        config: ClientConfig,
        cmd_tx: mpsc::UnboundedSender<Command>,
        closing: Arc<AtomicBool>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            transport,
            events,
            registry,
            poller,
            config,
            cmd_tx,
            closing,
            state_tx,
            lifecycle: RoomLifecycle::new(),
            session: None,
            handle: None,
            room: None,
            params: None,
            keepalive: None,
            background: None,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        if let Err(err) = self.init().await {
            self.report_error(err);
        }
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Connect(params) => self.connect(params).await,
                Command::Offer(sdp) => self.send_offer(sdp).await,
                Command::Answer(sdp) => self.send_answer(sdp).await,
                Command::Candidate(candidate) => self.send_candidate(candidate).await,
                Command::Fault(err) => self.report_error(err),
                Command::Disconnect => {
                    self.disconnect().await;
                    break;
                }
            }
        }
        debug!("signaling worker stopped");
    }

    /// Fetch the gateway descriptor and create the session.
    async fn init(&mut self) -> Result<()> {
        let call = self.registry.begin(CallSlot::Current);
        let fetched = self.transport.server_info(&call).await;
        self.registry.finish(CallSlot::Current, &call);
        let info = fetched?;
        info!(name = %info.name, version = ?info.version_string, "gateway reachable");

        let envelope = self
            .tracked_request(Scope::Server, Create::new().into())
            .await?;
        let session = envelope.into_created_id()?;
        info!(session, "gateway session created");
        self.session = Some(session);
        self.spawn_keepalive(session);
        Ok(())
    }

    async fn connect(&mut self, params: RoomConnectParams) {
        let Some(session) = self.session else {
            self.report_error(SignalError::InvalidState {
                op: "connect without a session",
                state: self.lifecycle.state(),
            });
            return;
        };
        self.lifecycle.reset();
        self.publish_state();
        self.params = Some(params.clone());
        if let Err(err) = self.connect_inner(session, &params).await {
            self.report_error(err);
        }
    }

    async fn connect_inner(
        &mut self,
        session: SessionId,
        params: &RoomConnectParams,
    ) -> Result<()> {
        let envelope = self
            .tracked_request(Scope::Session(session), Attach::new().into())
            .await?;
        let handle = envelope.into_created_id()?;
        self.handle = Some(handle);
        self.room = Some(RoomState {
            room: params.room,
            publisher_id: None,
        });
        self.lifecycle.on_attached()?;
        self.publish_state();
        info!(handle, room = params.room, "attached to video-room plugin");

        let publisher_id = match self.join(session, handle, params).await {
            Ok(id) => id,
            Err(err) => {
                // Join failed after attach succeeded: roll the handle back
                // best-effort before reporting.
                self.detach_handle(session).await;
                return Err(err);
            }
        };
        self.lifecycle.on_joined()?;
        self.publish_state();
        info!(room = params.room, publisher_id, "joined room");

        // The protocol has no "fully connected" event; connected is a
        // local decision made right after the join.
        self.lifecycle.on_connected()?;
        self.publish_state();
        let parameters = RoomParameters {
            room: params.room,
            publisher_id,
            initiator: true,
            ice_servers: Vec::new(),
        };
        self.events.on_connected_to_room(&parameters);
        Ok(())
    }

    /// Send the join request and drain until the joined event, returning
    /// the publisher id the gateway assigned.
    async fn join(
        &mut self,
        session: SessionId,
        handle: HandleId,
        params: &RoomConnectParams,
    ) -> Result<u64> {
        let message = PluginMessage::new(MessageBody::join(params.room, params.display.clone()));
        let envelope = self
            .tracked_request(Scope::Handle(session, handle), message.into())
            .await?;
        let frame = match envelope {
            Envelope::Event(frame) => frame,
            Envelope::Ack { .. } | Envelope::Keepalive => {
                self.poller.await_event(session, CallSlot::Current).await?
            }
            Envelope::Error { error, .. } => {
                return Err(ProtocolError::Gateway {
                    code: error.code,
                    reason: error.reason,
                }
                .into())
            }
            other => {
                return Err(ProtocolError::Unexpected {
                    expected: "ack",
                    got: other.kind(),
                }
                .into())
            }
        };
        let data = frame
            .plugindata
            .ok_or(ProtocolError::MissingPayload("plugindata"))?
            .data;
        if let Some(reason) = data.error {
            return Err(ProtocolError::Gateway {
                code: data.error_code.unwrap_or(0),
                reason,
            }
            .into());
        }
        let publisher_id = data
            .id
            .ok_or(ProtocolError::MissingPayload("plugindata.data.id"))?;
        if let Some(room) = self.room.as_mut() {
            room.publisher_id = Some(publisher_id);
        }
        Ok(publisher_id)
    }

    async fn send_offer(&mut self, sdp: String) {
        if let Err(err) = self.send_offer_inner(sdp).await {
            self.report_error(err);
        }
    }

    async fn send_offer_inner(&mut self, sdp: String) -> Result<()> {
        if !self.lifecycle.is_connected() {
            return Err(SignalError::InvalidState {
                op: "send offer",
                state: self.lifecycle.state(),
            });
        }
        if self.loopback() {
            // Self-test: the offer comes straight back as the answer.
            let answer = Jsep::answer(sdp);
            self.events.on_remote_description(&answer);
            return Ok(());
        }
        let (session, handle) = self.scoped("send offer")?;
        let message =
            PluginMessage::with_jsep(MessageBody::configure(true, true), Jsep::offer(sdp));
        let envelope = self
            .tracked_request(Scope::Handle(session, handle), message.into())
            .await?;
        let answer = match envelope {
            // The gateway normally acks; an inline event already carries
            // the answer.
            Envelope::Event(frame) => Self::jsep_of(frame)?,
            Envelope::Ack { .. } | Envelope::Keepalive => {
                let frame = self.poller.await_event(session, CallSlot::Current).await?;
                Self::jsep_of(frame)?
            }
            Envelope::Error { error, .. } => {
                return Err(ProtocolError::Gateway {
                    code: error.code,
                    reason: error.reason,
                }
                .into())
            }
            other => {
                return Err(ProtocolError::Unexpected {
                    expected: "ack",
                    got: other.kind(),
                }
                .into())
            }
        };
        debug!("received remote answer");
        self.events.on_remote_description(&answer);
        Ok(())
    }

    fn jsep_of(frame: EventFrame) -> Result<Jsep> {
        frame
            .jsep
            .ok_or(ProtocolError::MissingPayload("jsep"))
            .map_err(Into::into)
    }

    async fn send_answer(&mut self, sdp: String) {
        if let Err(err) = self.send_answer_inner(sdp).await {
            self.report_error(err);
        }
    }

    async fn send_answer_inner(&mut self, sdp: String) -> Result<()> {
        if self.loopback() {
            // Loopback never needs an externally generated answer.
            return Err(SignalError::InvalidState {
                op: "send answer in loopback",
                state: self.lifecycle.state(),
            });
        }
        if !self.lifecycle.is_connected() {
            return Err(SignalError::InvalidState {
                op: "send answer",
                state: self.lifecycle.state(),
            });
        }
        let (session, handle) = self.scoped("send answer")?;
        let room = self.room.as_ref().map(|r| r.room).unwrap_or_default();
        let message = PluginMessage::with_jsep(MessageBody::start(room), Jsep::answer(sdp));
        let envelope = self
            .tracked_request(Scope::Handle(session, handle), message.into())
            .await?;
        debug!(kind = envelope.kind(), "answer sent");
        Ok(())
    }

    async fn send_candidate(&mut self, candidate: IceCandidate) {
        if let Err(err) = self.send_candidate_inner(candidate).await {
            let shutting_down = err.is_cancelled() && self.closing.load(Ordering::SeqCst);
            if !shutting_down && !err.is_state_violation() {
                self.registry.cancel_all();
                if let Some(session) = self.session {
                    self.detach_handle(session).await;
                }
            }
            self.report_error(err);
        }
    }

    async fn send_candidate_inner(&mut self, candidate: IceCandidate) -> Result<()> {
        if !self.lifecycle.is_connected() {
            return Err(SignalError::InvalidState {
                op: "send candidate",
                state: self.lifecycle.state(),
            });
        }
        if self.loopback() {
            // Echoed back as if the peer had trickled it to us.
            self.events.on_remote_ice_candidate(&candidate);
            return Ok(());
        }
        let (session, handle) = self.scoped("send candidate")?;
        let envelope = self
            .tracked_request(Scope::Handle(session, handle), Trickle::new(candidate).into())
            .await?;
        match envelope {
            Envelope::Ack { .. } | Envelope::Keepalive => {
                self.ensure_background_poll(session);
                Ok(())
            }
            Envelope::Event(frame) => {
                debug!(sender = ?frame.sender, "inline trickle event");
                Ok(())
            }
            Envelope::Error { error, .. } => Err(ProtocolError::Gateway {
                code: error.code,
                reason: error.reason,
            }
            .into()),
            other => Err(ProtocolError::Unexpected {
                expected: "ack",
                got: other.kind(),
            }
            .into()),
        }
    }

    /// Keep remote candidates flowing without blocking the worker. Only
    /// the worker spawns this task, so tracking the handle here is enough
    /// to guarantee a single long-poll consumer.
    fn ensure_background_poll(&mut self, session: SessionId) {
        if self.background.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let poller = self.poller.clone();
        let events = self.events.clone();
        let faults = self.cmd_tx.clone();
        self.background = Some(tokio::spawn(async move {
            if let Err(err) = poller.run_background(session, events).await {
                let _ = faults.send(Command::Fault(err));
            }
        }));
    }

    async fn disconnect(&mut self) {
        debug!(state = ?self.lifecycle.state(), "disconnecting");
        self.registry.cancel_all();
        if let Some(task) = self.keepalive.take() {
            task.abort();
        }
        // The background drain ends itself on the cancelled poll.
        self.background = None;
        if let Some(session) = self.session {
            self.detach_handle(session).await;
            self.destroy(session).await;
        }
        self.session = None;
        self.handle = None;
        self.room = None;
        self.params = None;
        self.lifecycle.on_closed();
        self.publish_state();
        info!("disconnected");
    }

    /// Best-effort detach; failures are logged, never raised. Local handle
    /// state is cleared regardless.
    async fn detach_handle(&mut self, session: SessionId) {
        if let Some(handle) = self.handle {
            let result = self
                .cleanup_request(Scope::Handle(session, handle), Detach::new().into())
                .await;
            match result {
                Ok(_) => debug!(handle, "detached"),
                Err(err) if err.is_cancelled() => debug!(handle, "detach cancelled"),
                Err(err) => warn!(handle, %err, "detach failed"),
            }
        }
        self.handle = None;
        self.room = None;
    }

    /// Best-effort destroy; local session state is cleared regardless.
    async fn destroy(&mut self, session: SessionId) {
        let result = self
            .cleanup_request(Scope::Session(session), Destroy::new().into())
            .await;
        match result {
            Ok(envelope) => debug!(session, kind = envelope.kind(), "session destroyed"),
            Err(err) if err.is_cancelled() => debug!(session, "destroy cancelled"),
            Err(err) => warn!(session, %err, "destroy failed"),
        }
    }

    /// The single error funnel: cancel outstanding calls, enter ERROR at
    /// most once, notify the sink at most once. Cancellations during
    /// shutdown and refusals of out-of-state operations take shortcuts —
    /// the former is silent, the latter notifies without failing the
    /// channel.
    fn report_error(&mut self, err: SignalError) {
        if err.is_cancelled() && self.closing.load(Ordering::SeqCst) {
            debug!("call cancelled during shutdown");
            return;
        }
        if err.is_state_violation() {
            warn!(%err, "operation refused");
            if self.lifecycle.state() != ConnectionState::Error {
                self.events.on_channel_error(&err.to_string());
            }
            return;
        }
        warn!(%err, "signaling failure");
        self.registry.cancel_all();
        match self.lifecycle.on_failed() {
            Ok(_) => {
                self.publish_state();
                self.events.on_channel_error(&err.to_string());
            }
            Err(_) => debug!("suppressing repeated error report"),
        }
    }

    /// Post keepalives so the gateway does not expire the session while
    /// no long-poll is outstanding. Fire-and-forget: these calls are
    /// deliberately untracked so they never displace the current slot.
    fn spawn_keepalive(&mut self, session: SessionId) {
        let transport = self.transport.clone();
        let interval = self.config.keepalive_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let call = CallHandle::new();
                let request = OutboundRequest::from(KeepAlive::new());
                match transport
                    .request(Scope::Session(session), &request, &call)
                    .await
                {
                    Ok(_) => debug!(session, "keepalive"),
                    Err(err) => debug!(session, %err, "keepalive failed"),
                }
            }
        });
        self.keepalive = Some(task);
    }

    async fn tracked_request(&self, scope: Scope, request: OutboundRequest) -> Result<Envelope> {
        let call = self.registry.begin(CallSlot::Current);
        let result = self.transport.request(scope, &request, &call).await;
        self.registry.finish(CallSlot::Current, &call);
        result
    }

    /// Cleanup calls run on an untracked handle: the registry is already
    /// shut by the time teardown issues detach/destroy, and best-effort
    /// cleanup must not be displaced by it. Bounded by transport timeouts.
    async fn cleanup_request(&self, scope: Scope, request: OutboundRequest) -> Result<Envelope> {
        let call = CallHandle::new();
        self.transport.request(scope, &request, &call).await
    }

    fn scoped(&self, op: &'static str) -> Result<(SessionId, HandleId)> {
        match (self.session, self.handle) {
            (Some(session), Some(handle)) => Ok((session, handle)),
            _ => Err(SignalError::InvalidState {
                op,
                state: self.lifecycle.state(),
            }),
        }
    }

    fn loopback(&self) -> bool {
        self.params.as_ref().is_some_and(|p| p.loopback)
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.lifecycle.state());
    }
}
