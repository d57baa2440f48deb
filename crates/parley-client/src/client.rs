//! The public client facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use janus_proto::{ConnectionState, IceCandidate};

use crate::calls::CallRegistry;
use crate::poller::EventPoller;
use crate::signaling::{Command, SignalingWorker};
use crate::transport::Transport;
use crate::types::{ClientConfig, RoomConnectParams, SignalingEvents};

/// Handle to a video-room signaling session.
///
/// Every operation is dispatched onto one serialized worker task and runs
/// in call order; no two operations interleave. `disconnect` additionally
/// cancels any in-flight gateway call from the caller's context, so a
/// worker blocked in a long-poll drain unwinds promptly instead of
/// waiting out the server.
pub struct VideoRoomClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    registry: Arc<CallRegistry>,
    closing: Arc<AtomicBool>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl VideoRoomClient {
    /// Spawn the signaling worker. Fetching the gateway descriptor and
    /// creating the session begin immediately; must be called within a
    /// tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        events: Arc<dyn SignalingEvents>,
        config: ClientConfig,
    ) -> Self {
        let registry = Arc::new(CallRegistry::new());
        let poller = Arc::new(EventPoller::new(
            transport.clone(),
            registry.clone(),
            config.event_wait_timeout,
        ));
        let closing = Arc::new(AtomicBool::new(false));
        let (state_tx, state_rx) = watch::channel(ConnectionState::New);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let worker = SignalingWorker::new(
            transport,
            events,
            registry.clone(),
            poller,
            config,
            cmd_tx.clone(),
            closing.clone(),
            state_tx,
        );
        tokio::spawn(worker.run(cmd_rx));
        Self {
            cmd_tx,
            registry,
            closing,
            state_rx,
        }
    }

    /// Attach to the video-room plugin and join the room.
    pub fn connect(&self, params: RoomConnectParams) {
        self.send(Command::Connect(params));
    }

    /// Send the local offer; the remote answer arrives on the event sink.
    pub fn send_offer(&self, sdp: impl Into<String>) {
        self.send(Command::Offer(sdp.into()));
    }

    /// Send a local answer. Refused while loopback is active.
    pub fn send_answer(&self, sdp: impl Into<String>) {
        self.send(Command::Answer(sdp.into()));
    }

    /// Trickle one local ICE candidate to the gateway.
    pub fn send_candidate(&self, candidate: IceCandidate) {
        self.send(Command::Candidate(candidate));
    }

    /// Tear the session down. Safe to call more than once and from any
    /// task; cancellation happens before the worker's own teardown runs,
    /// and units still queued behind the disconnect resolve as cancelled
    /// instead of issuing fresh calls.
    pub fn disconnect(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.registry.close();
        self.send(Command::Disconnect);
    }

    /// The current connection phase.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A watch over connection phase changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("signaling worker already stopped");
        }
    }
}

impl Drop for VideoRoomClient {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        self.registry.close();
        let _ = self.cmd_tx.send(Command::Disconnect);
    }
}
