//! # rtcall relay-core
//!
//! The signaling relay: forwards call-control envelopes between exactly
//! two identified parties, consulting the presence registry for
//! reachability. The relay holds no call state — all "who is in a call
//! with whom" logic lives in each party's own call controller — so any
//! number of relay processes could sit behind a shared registry.
//!
//! The WebSocket front end lives in [`server`]; the transport-agnostic
//! forwarding core lives in [`router`].

pub mod error;
pub mod router;
pub mod server;

pub use error::{RelayError, Result};
pub use router::SignalingRelay;
pub use server::{AppState, app, serve};
