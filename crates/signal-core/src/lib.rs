//! # rtcall signal-core
//!
//! Wire protocol for the rtcall signaling stack: connection identifiers,
//! negotiation payload types, the relayed [`Envelope`] unit, and the
//! JSON message enums exchanged over the persistent per-party channel.
//!
//! This crate is shared by the server side (relay-core) and the client
//! side (call-core); it holds types only and no I/O.

pub mod envelope;
pub mod message;
pub mod types;

pub use envelope::{Envelope, EnvelopeKind, SignalKind};
pub use message::{ClientMessage, PartyInfo, ServerMessage};
pub use types::{CandidateInit, ConnectionId, PartyStatus, SdpKind, SessionDescription};
