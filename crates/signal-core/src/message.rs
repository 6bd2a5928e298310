//! JSON wire messages
//!
//! Tagged message enums for the persistent per-party channel. Variant
//! and field names follow the original browser protocol, so a conforming
//! web client can speak to the relay unchanged.

use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, EnvelopeKind};
use crate::types::{CandidateInit, ConnectionId, PartyStatus, SessionDescription};

/// One entry of a `user-list` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub id: ConnectionId,
    pub name: String,
    pub status: PartyStatus,
}

/// Messages a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Register this connection under a display name.
    RegisterUser { name: String },
    /// Invite another party to a call.
    CallUser { to: ConnectionId, offer: SessionDescription },
    /// Answer a received invitation.
    MakeAnswer { to: ConnectionId, answer: SessionDescription },
    /// Forward a locally gathered connectivity hint.
    IceCandidate { to: ConnectionId, candidate: CandidateInit },
    /// End (or reject) a call with another party.
    CallEnded { to: ConnectionId },
}

/// Messages the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First message on every connection: the id the relay assigned.
    Welcome { id: ConnectionId },
    /// Full presence snapshot, sent to everyone on every registry change.
    UserList { users: Vec<PartyInfo> },
    /// A call invitation, relayed. `from_name` is the caller's display
    /// name as recorded by the registry.
    CallMade {
        from: ConnectionId,
        #[serde(rename = "fromName")]
        from_name: String,
        offer: SessionDescription,
    },
    /// The callee's answer, relayed.
    AnswerMade { from: ConnectionId, answer: SessionDescription },
    /// A connectivity hint, relayed.
    IceCandidate { from: ConnectionId, candidate: CandidateInit },
    /// Call teardown (or busy rejection), relayed.
    CallEnded { from: ConnectionId },
}

impl ServerMessage {
    /// Render an envelope for delivery to its target.
    ///
    /// `from_name` is only meaningful for call requests, where the
    /// callee's UI needs a caller name before any session exists.
    pub fn from_envelope(envelope: Envelope, from_name: Option<String>) -> Self {
        let from = envelope.from;
        match envelope.kind {
            EnvelopeKind::CallRequest(offer) => ServerMessage::CallMade {
                from,
                from_name: from_name.unwrap_or_default(),
                offer,
            },
            EnvelopeKind::CallAnswer(answer) => ServerMessage::AnswerMade { from, answer },
            EnvelopeKind::IceCandidate(candidate) => ServerMessage::IceCandidate { from, candidate },
            EnvelopeKind::CallEnd => ServerMessage::CallEnded { from },
        }
    }

    /// Reinterpret a received server message as an envelope addressed to
    /// the receiving party. Returns `None` for non-call-control messages.
    pub fn into_envelope(self, local: &ConnectionId) -> Option<(Envelope, Option<String>)> {
        match self {
            ServerMessage::Welcome { .. } | ServerMessage::UserList { .. } => None,
            ServerMessage::CallMade { from, from_name, offer } => Some((
                Envelope::call_request(from, local.clone(), offer),
                Some(from_name),
            )),
            ServerMessage::AnswerMade { from, answer } => {
                Some((Envelope::call_answer(from, local.clone(), answer), None))
            }
            ServerMessage::IceCandidate { from, candidate } => {
                Some((Envelope::ice_candidate(from, local.clone(), candidate), None))
            }
            ServerMessage::CallEnded { from } => {
                Some((Envelope::call_end(from, local.clone()), None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn client_messages_use_original_event_names() {
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "register-user", "name": "Alice" })).unwrap();
        assert_eq!(msg, ClientMessage::RegisterUser { name: "Alice".into() });

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "call-user",
            "to": "b",
            "offer": { "type": "offer", "sdp": "v=0" },
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::CallUser {
                to: ConnectionId::from("b"),
                offer: SessionDescription::offer("v=0"),
            }
        );
    }

    #[test]
    fn call_made_carries_camel_cased_caller_name() {
        let rendered = serde_json::to_value(ServerMessage::CallMade {
            from: ConnectionId::from("a"),
            from_name: "Alice".into(),
            offer: SessionDescription::offer("v=0"),
        })
        .unwrap();
        assert_eq!(rendered["type"], "call-made");
        assert_eq!(rendered["fromName"], "Alice");
    }

    #[test]
    fn unknown_message_kind_is_a_decode_error() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({ "type": "upload-file", "to": "b" }));
        assert!(result.is_err());
    }

    #[test]
    fn server_message_round_trips_to_envelope() {
        let local = ConnectionId::from("me");
        let msg = ServerMessage::CallEnded { from: ConnectionId::from("peer") };
        let (env, name) = msg.into_envelope(&local).unwrap();
        assert_eq!(env, Envelope::call_end(ConnectionId::from("peer"), local));
        assert_eq!(name, None);
    }
}
