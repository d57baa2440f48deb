//! Janus gateway wire protocol for the video-room plugin.
//!
//! This crate provides:
//! - Outbound request payloads carrying their `janus` discriminant and a
//!   fresh transaction id
//! - Tagged envelope decoding for inbound frames (success/ack/event/...)
//! - JSEP and trickle candidate payloads
//! - The room connection lifecycle state machine

#![forbid(unsafe_code)]

pub mod jsep;
pub mod lifecycle;
pub mod request;
pub mod response;

pub use jsep::{IceCandidate, Jsep, SdpType, TricklePayload};
pub use lifecycle::{
    ConnectionState, LifecycleError, LifecycleEvent, RoomLifecycle, Transition,
};
pub use request::{
    Attach, Create, Destroy, Detach, KeepAlive, MessageBody, OutboundRequest, PluginMessage,
    Trickle,
};
pub use response::{
    decode_envelope, CreatedId, Envelope, ErrorInfo, EventFrame, HandleId, PluginData,
    ProtocolError, ServerInfo, SessionId, VideoRoomData,
};

/// Plugin identifier for the Janus video-room plugin.
pub const VIDEOROOM_PLUGIN: &str = "janus.plugin.videoroom";

/// Length of generated transaction identifiers.
pub const TRANSACTION_LEN: usize = 12;

/// Generate a fresh random transaction identifier.
///
/// The gateway echoes the id back on every response. Correlation of
/// long-poll frames stays positional, so uniqueness per in-flight request
/// is all that is required of the id itself.
pub fn transaction_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TRANSACTION_LEN)
        .map(char::from)
        .collect()
}
