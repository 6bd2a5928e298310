//! # rtcall call-core
//!
//! The per-party call session controller. One controller instance drives
//! the single call its party may be engaged in: offer/answer/candidate
//! exchange through the signaling relay, FIFO buffering of candidates
//! that arrive before a remote description exists, connectivity
//! monitoring, and the bounded retry/recovery policy.
//!
//! The controller is an actor: every external stimulus — a local user
//! command, an inbound envelope, a connectivity change, a timer expiry —
//! is queued as a [`controller::SessionEvent`] and processed to
//! completion, one at a time, by [`CallController::run`]. Events that
//! arrive while a transition is suspended on a collaborator call simply
//! wait in the queue, so no two transitions ever interleave for the same
//! session.
//!
//! Media capture and the actual network negotiation are not implemented
//! here; the application supplies them through the [`MediaEngine`] and
//! [`NegotiationEngine`] traits.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod session;
pub mod transport;

pub use config::CallConfig;
pub use controller::{CallController, CallControllerHandle};
pub use engine::{MediaEngine, NegotiationEngine, TrackKind, TrackSet};
pub use error::{CallError, Result};
pub use events::{CallEvent, ConnectivityState};
pub use session::{CallDirection, CallState};
pub use transport::SignalingTransport;
