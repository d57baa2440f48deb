//! Outbound request payloads.
//!
//! Each payload carries its own `janus` discriminant and a fresh transaction
//! id, exactly in the shape the gateway expects on the wire. Plugin
//! operations travel inside a `message` request as a `body` object, with an
//! optional JSEP alongside.

use serde::Serialize;

use crate::jsep::{IceCandidate, Jsep, TricklePayload};
use crate::{transaction_id, VIDEOROOM_PLUGIN};

#[derive(Debug, Clone, Serialize)]
pub struct Create {
    pub janus: &'static str,
    pub transaction: String,
}

impl Create {
    pub fn new() -> Self {
        Self {
            janus: "create",
            transaction: transaction_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Attach {
    pub janus: &'static str,
    pub plugin: &'static str,
    pub transaction: String,
}

impl Attach {
    pub fn new() -> Self {
        Self {
            janus: "attach",
            plugin: VIDEOROOM_PLUGIN,
            transaction: transaction_id(),
        }
    }
}

/// Video-room plugin message bodies.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    Join {
        request: &'static str,
        room: u64,
        ptype: &'static str,
        display: String,
    },
    Configure {
        request: &'static str,
        audio: bool,
        video: bool,
    },
    Start {
        request: &'static str,
        room: u64,
    },
}

impl MessageBody {
    pub fn join(room: u64, display: impl Into<String>) -> Self {
        Self::Join {
            request: "join",
            room,
            ptype: "publisher",
            display: display.into(),
        }
    }

    pub fn configure(audio: bool, video: bool) -> Self {
        Self::Configure {
            request: "configure",
            audio,
            video,
        }
    }

    pub fn start(room: u64) -> Self {
        Self::Start {
            request: "start",
            room,
        }
    }
}

/// A `message` request addressed to the attached plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginMessage {
    pub janus: &'static str,
    pub transaction: String,
    pub body: MessageBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsep: Option<Jsep>,
}

impl PluginMessage {
    pub fn new(body: MessageBody) -> Self {
        Self {
            janus: "message",
            transaction: transaction_id(),
            body,
            jsep: None,
        }
    }

    pub fn with_jsep(body: MessageBody, jsep: Jsep) -> Self {
        Self {
            jsep: Some(jsep),
            ..Self::new(body)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Trickle {
    pub janus: &'static str,
    pub transaction: String,
    pub candidate: TricklePayload,
}

impl Trickle {
    pub fn new(candidate: IceCandidate) -> Self {
        Self {
            janus: "trickle",
            transaction: transaction_id(),
            candidate: TricklePayload::Candidate(candidate),
        }
    }

    /// End-of-candidates marker.
    pub fn completed() -> Self {
        Self {
            janus: "trickle",
            transaction: transaction_id(),
            candidate: TricklePayload::completed(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Detach {
    pub janus: &'static str,
    pub transaction: String,
}

impl Detach {
    pub fn new() -> Self {
        Self {
            janus: "detach",
            transaction: transaction_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Destroy {
    pub janus: &'static str,
    pub transaction: String,
}

impl Destroy {
    pub fn new() -> Self {
        Self {
            janus: "destroy",
            transaction: transaction_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeepAlive {
    pub janus: &'static str,
    pub transaction: String,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self {
            janus: "keepalive",
            transaction: transaction_id(),
        }
    }
}

/// Any outbound request, for transports and tests that dispatch on kind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundRequest {
    Create(Create),
    Attach(Attach),
    Message(PluginMessage),
    Trickle(Trickle),
    Detach(Detach),
    Destroy(Destroy),
    KeepAlive(KeepAlive),
}

impl OutboundRequest {
    /// The wire discriminant this request carries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create(r) => r.janus,
            Self::Attach(r) => r.janus,
            Self::Message(r) => r.janus,
            Self::Trickle(r) => r.janus,
            Self::Detach(r) => r.janus,
            Self::Destroy(r) => r.janus,
            Self::KeepAlive(r) => r.janus,
        }
    }

    /// The transaction id this request carries.
    pub fn transaction(&self) -> &str {
        match self {
            Self::Create(r) => &r.transaction,
            Self::Attach(r) => &r.transaction,
            Self::Message(r) => &r.transaction,
            Self::Trickle(r) => &r.transaction,
            Self::Detach(r) => &r.transaction,
            Self::Destroy(r) => &r.transaction,
            Self::KeepAlive(r) => &r.transaction,
        }
    }
}

impl From<Create> for OutboundRequest {
    fn from(r: Create) -> Self {
        Self::Create(r)
    }
}

impl From<Attach> for OutboundRequest {
    fn from(r: Attach) -> Self {
        Self::Attach(r)
    }
}

impl From<PluginMessage> for OutboundRequest {
    fn from(r: PluginMessage) -> Self {
        Self::Message(r)
    }
}

impl From<Trickle> for OutboundRequest {
    fn from(r: Trickle) -> Self {
        Self::Trickle(r)
    }
}

impl From<Detach> for OutboundRequest {
    fn from(r: Detach) -> Self {
        Self::Detach(r)
    }
}

impl From<Destroy> for OutboundRequest {
    fn from(r: Destroy) -> Self {
        Self::Destroy(r)
    }
}

impl From<KeepAlive> for OutboundRequest {
    fn from(r: KeepAlive) -> Self {
        Self::KeepAlive(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_message_wire_shape() {
        let message = PluginMessage::new(MessageBody::join(1234, "alice"));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["janus"], "message");
        assert_eq!(json["body"]["request"], "join");
        assert_eq!(json["body"]["room"], 1234);
        assert_eq!(json["body"]["ptype"], "publisher");
        assert_eq!(json["body"]["display"], "alice");
        assert!(json.get("jsep").is_none());
        assert_eq!(json["transaction"].as_str().unwrap().len(), 12);
    }

    #[test]
    fn configure_with_offer_carries_jsep() {
        let message =
            PluginMessage::with_jsep(MessageBody::configure(true, true), Jsep::offer("v=0"));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["body"]["request"], "configure");
        assert_eq!(json["body"]["audio"], true);
        assert_eq!(json["jsep"]["type"], "offer");
        assert_eq!(json["jsep"]["sdp"], "v=0");
    }

    #[test]
    fn trickle_wraps_the_candidate() {
        let trickle = Trickle::new(IceCandidate {
            candidate: "candidate:0".to_string(),
            sdp_mid: "audio".to_string(),
            sdp_m_line_index: 0,
        });
        let json = serde_json::to_value(&trickle).unwrap();
        assert_eq!(json["janus"], "trickle");
        assert_eq!(json["candidate"]["sdpMid"], "audio");

        let done = serde_json::to_value(Trickle::completed()).unwrap();
        assert_eq!(done["candidate"]["completed"], true);
    }

    #[test]
    fn attach_names_the_videoroom_plugin() {
        let json = serde_json::to_value(Attach::new()).unwrap();
        assert_eq!(json["plugin"], "janus.plugin.videoroom");
    }

    #[test]
    fn outbound_request_reports_kind_and_transaction() {
        let request = OutboundRequest::from(Destroy::new());
        assert_eq!(request.kind(), "destroy");
        assert_eq!(request.transaction().len(), 12);
    }
}
