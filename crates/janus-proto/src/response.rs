//! Inbound envelope decoding.
//!
//! Every frame the gateway produces — inline responses and long-poll frames
//! alike — is keyed on its `janus` field. Decoding parses that discriminant
//! first and then the variant it selects; an unknown discriminant fails the
//! decode instead of being silently ignored.

use serde::Deserialize;

use crate::jsep::{Jsep, TricklePayload};

/// Server-assigned session identifier.
pub type SessionId = u64;

/// Server-assigned plugin handle identifier.
pub type HandleId = u64;

/// `data` payload of a `success` envelope (create and attach).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CreatedId {
    pub id: u64,
}

/// Gateway-reported failure payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    pub code: i64,
    pub reason: String,
}

/// Video-room plugin payload, typed but tolerant of absent fields.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoRoomData {
    /// Event kind reported by the plugin, e.g. `joined` or `event`.
    #[serde(default)]
    pub videoroom: Option<String>,
    #[serde(default)]
    pub room: Option<u64>,
    /// Publisher id assigned on join.
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginData {
    pub plugin: String,
    pub data: VideoRoomData,
}

/// A genuine asynchronous event frame.
#[derive(Debug, Clone, Deserialize)]
pub struct EventFrame {
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub sender: Option<HandleId>,
    #[serde(default)]
    pub plugindata: Option<PluginData>,
    #[serde(default)]
    pub jsep: Option<Jsep>,
}

/// Gateway identity, fetched once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub version_string: Option<String>,
}

/// One inbound frame, keyed on the `janus` discriminant.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "janus", rename_all = "snake_case")]
pub enum Envelope {
    Success {
        #[serde(default)]
        transaction: Option<String>,
        #[serde(default)]
        data: Option<CreatedId>,
    },
    Ack {
        #[serde(default)]
        transaction: Option<String>,
    },
    Event(EventFrame),
    Keepalive,
    Trickle {
        #[serde(default)]
        sender: Option<HandleId>,
        candidate: TricklePayload,
    },
    Error {
        #[serde(default)]
        transaction: Option<String>,
        error: ErrorInfo,
    },
    ServerInfo(ServerInfo),
}

impl Envelope {
    /// Wire discriminant of this envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Ack { .. } => "ack",
            Self::Event(_) => "event",
            Self::Keepalive => "keepalive",
            Self::Trickle { .. } => "trickle",
            Self::Error { .. } => "error",
            Self::ServerInfo(_) => "server_info",
        }
    }

    /// Extract the id created by a `create` or `attach` call.
    pub fn into_created_id(self) -> Result<u64, ProtocolError> {
        match self {
            Self::Success {
                data: Some(data), ..
            } => Ok(data.id),
            Self::Success { data: None, .. } => Err(ProtocolError::MissingPayload("data.id")),
            Self::Error { error, .. } => Err(ProtocolError::Gateway {
                code: error.code,
                reason: error.reason,
            }),
            other => Err(ProtocolError::Unexpected {
                expected: "success",
                got: other.kind(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("unexpected {got} envelope, expected {expected}")]
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
    #[error("gateway error {code}: {reason}")]
    Gateway { code: i64, reason: String },
    #[error("envelope missing {0}")]
    MissingPayload(&'static str),
}

/// Decode one inbound frame.
pub fn decode_envelope(raw: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(raw).map_err(|err| ProtocolError::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsep::SdpType;

    #[test]
    fn decodes_success_with_created_id() {
        let envelope =
            decode_envelope(r#"{"janus":"success","transaction":"abc","data":{"id":12345}}"#)
                .unwrap();
        assert_eq!(envelope.into_created_id().unwrap(), 12345);
    }

    #[test]
    fn decodes_ack_and_keepalive() {
        let ack = decode_envelope(r#"{"janus":"ack","transaction":"abc"}"#).unwrap();
        assert_eq!(ack.kind(), "ack");
        let keepalive = decode_envelope(r#"{"janus":"keepalive"}"#).unwrap();
        assert_eq!(keepalive.kind(), "keepalive");
    }

    #[test]
    fn decodes_event_with_plugindata_and_jsep() {
        let raw = r#"{
            "janus": "event",
            "sender": 99,
            "plugindata": {
                "plugin": "janus.plugin.videoroom",
                "data": {"videoroom": "joined", "room": 1234, "id": 777}
            },
            "jsep": {"type": "answer", "sdp": "v=0"}
        }"#;
        let Envelope::Event(frame) = decode_envelope(raw).unwrap() else {
            panic!("not an event");
        };
        assert_eq!(frame.sender, Some(99));
        let data = frame.plugindata.unwrap().data;
        assert_eq!(data.videoroom.as_deref(), Some("joined"));
        assert_eq!(data.id, Some(777));
        let jsep = frame.jsep.unwrap();
        assert_eq!(jsep.kind, SdpType::Answer);
        assert_eq!(jsep.sdp, "v=0");
    }

    #[test]
    fn decodes_remote_trickle() {
        let raw = r#"{
            "janus": "trickle",
            "sender": 99,
            "candidate": {"candidate": "candidate:0", "sdpMid": "0", "sdpMLineIndex": 0}
        }"#;
        let Envelope::Trickle { candidate, .. } = decode_envelope(raw).unwrap() else {
            panic!("not a trickle");
        };
        assert!(matches!(candidate, TricklePayload::Candidate(_)));
    }

    #[test]
    fn decodes_gateway_error() {
        let raw = r#"{"janus":"error","error":{"code":458,"reason":"No such session"}}"#;
        let envelope = decode_envelope(raw).unwrap();
        let err = envelope.into_created_id().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Gateway {
                code: 458,
                reason: "No such session".to_string()
            }
        );
    }

    #[test]
    fn decodes_server_info() {
        let raw = r#"{"janus":"server_info","name":"Janus WebRTC Server","version":63,"version_string":"0.6.3","transports":{}}"#;
        let Envelope::ServerInfo(info) = decode_envelope(raw).unwrap() else {
            panic!("not server_info");
        };
        assert_eq!(info.name, "Janus WebRTC Server");
        assert_eq!(info.version, Some(63));
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        assert!(matches!(
            decode_envelope(r#"{"janus":"hangup","reason":"ice failed"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_envelope("not json").is_err());
        assert!(decode_envelope(r#"{"no_discriminant":true}"#).is_err());
    }

    #[test]
    fn success_without_data_is_missing_payload() {
        let envelope = decode_envelope(r#"{"janus":"success"}"#).unwrap();
        assert_eq!(
            envelope.into_created_id().unwrap_err(),
            ProtocolError::MissingPayload("data.id")
        );
    }

    #[test]
    fn ack_is_not_a_created_id() {
        let envelope = decode_envelope(r#"{"janus":"ack"}"#).unwrap();
        assert!(matches!(
            envelope.into_created_id(),
            Err(ProtocolError::Unexpected {
                expected: "success",
                got: "ack"
            })
        ));
    }
}
