//! Events emitted to the application and observed from the network

use chrono::{DateTime, Utc};

use rtcall_signal_core::ConnectionId;

use crate::engine::TrackSet;
use crate::session::CallState;

/// Connectivity state reported by the negotiation engine.
///
/// The variant set mirrors the browser's peer-connection states; the
/// controller reacts to `Connected`/`Completed`, `Disconnected`,
/// `Failed` and `Closed` and ignores the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Events the controller publishes on its broadcast channel.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The session moved between states.
    StateChanged {
        previous: CallState,
        current: CallState,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// A call invitation arrived while idle; answer with
    /// [`accept`](crate::CallControllerHandle::accept) or
    /// [`decline`](crate::CallControllerHandle::decline).
    IncomingCall { from: ConnectionId, display_name: Option<String> },
    /// The negotiation engine delivered the peer's track set; it has
    /// already been handed to the media engine for rendering.
    RemoteTracks { tracks: TrackSet },
    /// The called party was already in a call (or declined while we
    /// were still dialing).
    PeerBusy { peer: ConnectionId },
    /// An established call ended.
    CallEnded { peer: ConnectionId, by_peer: bool },
    /// The session failed and was terminated.
    CallFailed { reason: String },
}
