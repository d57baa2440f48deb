//! Signaling client for a Janus video-room gateway over REST + long-poll.
//!
//! The gateway has no push channel: asynchronous results arrive on a
//! long-poll endpoint interleaved with acks and keepalives. This crate
//! recovers request/response semantics on top of that:
//! - `Transport` port plus a `reqwest`-backed implementation
//! - a call registry so a disconnect can cancel in-flight calls from
//!   outside the worker
//! - the long-poll event drain
//! - the serialized signaling worker behind the `VideoRoomClient` facade

pub mod calls;
pub mod client;
pub mod error;
pub mod http;
pub mod poller;
mod signaling;
pub mod transport;
pub mod types;

pub use calls::{CallHandle, CallRegistry, CallSlot};
pub use client::VideoRoomClient;
pub use error::{Result, SignalError};
pub use http::HttpTransport;
pub use poller::EventPoller;
pub use transport::{Scope, Transport};
pub use types::{ClientConfig, RoomConnectParams, RoomParameters, SignalingEvents};
