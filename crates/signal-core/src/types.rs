//! Core identifier and payload types shared across the signaling stack

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one connected party, assigned by the relay at connect time.
///
/// Opaque to clients; they learn their own id from the `welcome` message
/// and their peers' ids from `user-list` snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh connection id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Reachability status of a registered party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Online,
    Offline,
}

/// Whether a session description proposes or accepts a media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A negotiation description produced by a negotiation engine.
///
/// Mirrors the JSON shape of the browser's `RTCSessionDescription` so the
/// payload passes through the relay untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpKind::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpKind::Answer, sdp: sdp.into() }
    }
}

/// A connectivity-establishment hint, in the browser's
/// `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInit {
    pub candidate: String,
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
}

impl CandidateInit {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self { candidate: candidate.into(), sdp_mid: None, sdp_mline_index: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_serializes_with_browser_field_names() {
        let desc = SessionDescription::offer("v=0");
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["type"], "offer");
        assert_eq!(json["sdp"], "v=0");
    }

    #[test]
    fn candidate_omits_absent_mid_fields() {
        let json = serde_json::to_value(CandidateInit::new("candidate:0 1 UDP")).unwrap();
        assert!(json.get("sdpMid").is_none());
        assert!(json.get("sdpMLineIndex").is_none());
    }

    #[test]
    fn connection_ids_order_lexicographically() {
        let a = ConnectionId::from("aaa");
        let b = ConnectionId::from("bbb");
        assert!(a < b);
    }
}
