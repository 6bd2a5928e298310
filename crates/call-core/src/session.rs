//! Call session state
//!
//! One [`CallSession`] is the single source of truth for the call a
//! party is engaged in. It exists from initiation or ringing until the
//! state machine reaches [`CallState::Terminated`], at which point the
//! controller discards it entirely; a controller is back in
//! [`CallState::Idle`] exactly when it holds no session.

use std::collections::VecDeque;

use tokio::task::AbortHandle;
use tracing::debug;

use rtcall_signal_core::{CandidateInit, ConnectionId, SessionDescription};

use crate::engine::TrackSet;

/// The call state machine.
///
/// `Idle → Dialing | Ringing → Negotiating → Connected → {Reconnecting}
/// → Terminated`. `Terminated` is the sole terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Dialing,
    Ringing,
    Negotiating,
    Connected,
    Reconnecting,
    Terminated,
}

/// Who initiated the call, from this party's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Timers a session may own. Each is cancelled by any transition that
/// supersedes its purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Unanswered call (Dialing or Ringing) expiry.
    Negotiation,
    /// Reconnection window after connectivity loss.
    ReconnectGrace,
}

/// Handle to one armed timer task.
///
/// The generation distinguishes a live timer from one that was already
/// superseded: a fired timer whose generation no longer matches is
/// ignored by the controller.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    pub generation: u64,
    pub abort: AbortHandle,
}

#[derive(Debug, Default)]
pub(crate) struct SessionTimers {
    negotiation: Option<TimerHandle>,
    grace: Option<TimerHandle>,
}

impl SessionTimers {
    pub fn arm(&mut self, kind: TimerKind, handle: TimerHandle) {
        let slot = self.slot(kind);
        if let Some(old) = slot.replace(handle) {
            old.abort.abort();
        }
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.slot(kind).take() {
            handle.abort.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerKind::Negotiation);
        self.cancel(TimerKind::ReconnectGrace);
    }

    /// Whether a fired timer is the currently armed one; clears the slot
    /// when it is.
    pub fn acknowledge(&mut self, kind: TimerKind, generation: u64) -> bool {
        let slot = self.slot(kind);
        match slot {
            Some(handle) if handle.generation == generation => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::Negotiation => &mut self.negotiation,
            TimerKind::ReconnectGrace => &mut self.grace,
        }
    }
}

/// Per-party state for one call.
#[derive(Debug)]
pub(crate) struct CallSession {
    pub peer: ConnectionId,
    pub peer_name: Option<String>,
    pub direction: CallDirection,
    pub state: CallState,
    /// The offer held while Ringing, applied on accept.
    pub pending_offer: Option<SessionDescription>,
    /// Candidates that arrived before the remote description, in
    /// arrival order.
    pub pending_candidates: VecDeque<CandidateInit>,
    pub remote_description_set: bool,
    pub connection_attempts: u32,
    pub local_tracks: Option<TrackSet>,
    pub timers: SessionTimers,
}

impl CallSession {
    pub fn outgoing(peer: ConnectionId) -> Self {
        Self {
            peer,
            peer_name: None,
            direction: CallDirection::Outgoing,
            state: CallState::Dialing,
            pending_offer: None,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
            connection_attempts: 0,
            local_tracks: None,
            timers: SessionTimers::default(),
        }
    }

    pub fn incoming(
        peer: ConnectionId,
        peer_name: Option<String>,
        offer: SessionDescription,
    ) -> Self {
        Self {
            peer,
            peer_name,
            direction: CallDirection::Incoming,
            state: CallState::Ringing,
            pending_offer: Some(offer),
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
            connection_attempts: 0,
            local_tracks: None,
            timers: SessionTimers::default(),
        }
    }

    /// Move to a new state, logging the transition.
    pub fn set_state(&mut self, new_state: CallState) -> CallState {
        let old_state = self.state;
        self.state = new_state;
        debug!(peer = %self.peer, ?old_state, ?new_state, "session state changed");
        old_state
    }
}
