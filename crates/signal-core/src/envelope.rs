//! The relayed message unit
//!
//! An [`Envelope`] is the relay-internal, normalized form of one
//! call-control message: who it is from, who it is for, and the
//! negotiation payload. Envelopes are immutable and never retained by
//! the relay after forwarding.

use std::fmt;

use crate::message::ClientMessage;
use crate::types::{CandidateInit, ConnectionId, SessionDescription};

/// Kind and payload of a relayed call-control message.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeKind {
    /// An invitation to start a call, carrying the caller's offer.
    CallRequest(SessionDescription),
    /// The callee's acceptance, carrying its answer.
    CallAnswer(SessionDescription),
    /// A connectivity hint gathered by one side's negotiation engine.
    IceCandidate(CandidateInit),
    /// Call teardown or busy rejection. Carries no payload.
    CallEnd,
}

/// Payload-free discriminant of an [`EnvelopeKind`], for logging and
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    CallRequest,
    CallAnswer,
    IceCandidate,
    CallEnd,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::CallRequest => "call-request",
            SignalKind::CallAnswer => "call-answer",
            SignalKind::IceCandidate => "ice-candidate",
            SignalKind::CallEnd => "call-end",
        };
        f.write_str(name)
    }
}

/// One addressed signaling message travelling through the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub from: ConnectionId,
    pub to: ConnectionId,
    pub kind: EnvelopeKind,
}

impl Envelope {
    pub fn call_request(from: ConnectionId, to: ConnectionId, offer: SessionDescription) -> Self {
        Self { from, to, kind: EnvelopeKind::CallRequest(offer) }
    }

    pub fn call_answer(from: ConnectionId, to: ConnectionId, answer: SessionDescription) -> Self {
        Self { from, to, kind: EnvelopeKind::CallAnswer(answer) }
    }

    pub fn ice_candidate(from: ConnectionId, to: ConnectionId, candidate: CandidateInit) -> Self {
        Self { from, to, kind: EnvelopeKind::IceCandidate(candidate) }
    }

    pub fn call_end(from: ConnectionId, to: ConnectionId) -> Self {
        Self { from, to, kind: EnvelopeKind::CallEnd }
    }

    /// The payload-free kind, for logs.
    pub fn signal_kind(&self) -> SignalKind {
        match &self.kind {
            EnvelopeKind::CallRequest(_) => SignalKind::CallRequest,
            EnvelopeKind::CallAnswer(_) => SignalKind::CallAnswer,
            EnvelopeKind::IceCandidate(_) => SignalKind::IceCandidate,
            EnvelopeKind::CallEnd => SignalKind::CallEnd,
        }
    }

    /// Normalize an inbound client message into an envelope.
    ///
    /// The `sender` is the relay's own record of who this connection is;
    /// any sender identity a client might claim inside the message is
    /// ignored. Returns `None` for messages that are not call-control
    /// (registration is handled before routing).
    pub fn from_client(sender: &ConnectionId, message: ClientMessage) -> Option<Self> {
        match message {
            ClientMessage::RegisterUser { .. } => None,
            ClientMessage::CallUser { to, offer } => {
                Some(Self::call_request(sender.clone(), to, offer))
            }
            ClientMessage::MakeAnswer { to, answer } => {
                Some(Self::call_answer(sender.clone(), to, answer))
            }
            ClientMessage::IceCandidate { to, candidate } => {
                Some(Self::ice_candidate(sender.clone(), to, candidate))
            }
            ClientMessage::CallEnded { to } => Some(Self::call_end(sender.clone(), to)),
        }
    }
}
