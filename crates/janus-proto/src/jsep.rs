//! JSEP session descriptions and trickled ICE candidates.

use serde::{Deserialize, Serialize};

/// Which side of the offer/answer exchange a description belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description plus its type, as nested under `jsep` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jsep {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl Jsep {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A single ICE candidate in the shape the gateway trickles them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u32,
}

/// Trickle payload: one candidate, or the end-of-candidates marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TricklePayload {
    Candidate(IceCandidate),
    Completed { completed: bool },
}

impl TricklePayload {
    pub fn completed() -> Self {
        Self::Completed { completed: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsep_wire_shape() {
        let jsep = Jsep::offer("v=0\r\n");
        let json = serde_json::to_value(&jsep).unwrap();
        assert_eq!(json["type"], "offer");
        assert_eq!(json["sdp"], "v=0\r\n");
    }

    #[test]
    fn candidate_field_names_match_the_wire() {
        let candidate = IceCandidate {
            candidate: "candidate:0 1 UDP 2122252543 192.0.2.1 54321 typ host".to_string(),
            sdp_mid: "audio".to_string(),
            sdp_m_line_index: 0,
        };
        let json = serde_json::to_value(&candidate).unwrap();
        assert!(json.get("sdpMid").is_some());
        assert!(json.get("sdpMLineIndex").is_some());
        assert!(json.get("sdp_mid").is_none());
    }

    #[test]
    fn trickle_payload_decodes_both_shapes() {
        let one: TricklePayload =
            serde_json::from_str(r#"{"candidate":"c","sdpMid":"0","sdpMLineIndex":0}"#).unwrap();
        assert!(matches!(one, TricklePayload::Candidate(_)));

        let done: TricklePayload = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert!(matches!(done, TricklePayload::Completed { completed: true }));
    }
}
