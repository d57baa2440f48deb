//! Public configuration, connection parameters, and the event sink.

use std::time::Duration;

use janus_proto::{IceCandidate, Jsep};

/// Default bound on one event drain; covers several of the gateway's ~30 s
/// long-poll hold intervals before giving up.
pub const DEFAULT_EVENT_WAIT: Duration = Duration::from_secs(120);

/// The gateway expires idle sessions after ~60 s; keepalives are posted
/// well inside that window.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Client-wide tuning knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on waiting for a genuine event past acks/keepalives.
    pub event_wait_timeout: Duration,
    /// Interval between session keepalive posts.
    pub keepalive_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            event_wait_timeout: DEFAULT_EVENT_WAIT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

/// Parameters for one room connection attempt.
#[derive(Debug, Clone)]
pub struct RoomConnectParams {
    pub room: u64,
    /// Display name announced to the room.
    pub display: String,
    /// Self-test mode: offers and local candidates are echoed straight
    /// back without touching the gateway.
    pub loopback: bool,
}

/// Locally synthesized parameters handed out once the room is joined.
///
/// The protocol has no "fully connected" server event; these are produced
/// the moment the join completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomParameters {
    pub room: u64,
    /// Publisher id the gateway assigned on join.
    pub publisher_id: u64,
    /// This client opens the negotiation.
    pub initiator: bool,
    pub ice_servers: Vec<String>,
}

/// Callbacks the embedding layer receives from the signaling worker.
///
/// Calls arrive on worker or poller tasks; implementations should hand off
/// quickly and must not call back into the client synchronously.
pub trait SignalingEvents: Send + Sync {
    /// The room was joined and local parameters are ready.
    fn on_connected_to_room(&self, params: &RoomParameters);

    /// The remote session description arrived.
    fn on_remote_description(&self, jsep: &Jsep);

    /// A remote ICE candidate arrived.
    fn on_remote_ice_candidate(&self, candidate: &IceCandidate);

    /// The channel failed. Reported once per attempt; the first error wins.
    fn on_channel_error(&self, description: &str);
}
