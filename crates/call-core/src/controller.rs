//! The call session controller
//!
//! An actor around a single event queue. Every stimulus — user command,
//! inbound envelope, connectivity change, locally gathered candidate,
//! timer expiry — becomes a [`SessionEvent`] and is processed to
//! completion before the next one is dequeued. Collaborator calls are
//! the only suspension points, and events arriving during one simply
//! wait in the queue, so transitions never interleave for a session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use rtcall_signal_core::{
    CandidateInit, ConnectionId, Envelope, EnvelopeKind, ServerMessage, SessionDescription,
};

use crate::config::CallConfig;
use crate::engine::{MediaEngine, NegotiationEngine, TrackKind, TrackSet};
use crate::events::{CallEvent, ConnectivityState};
use crate::session::{CallDirection, CallSession, CallState, TimerHandle, TimerKind};
use crate::transport::SignalingTransport;

const EVENT_CAPACITY: usize = 64;

/// Local user commands.
#[derive(Debug, Clone)]
pub enum Command {
    Call { peer: ConnectionId },
    Accept,
    Decline,
    HangUp,
    SetTrackEnabled { kind: TrackKind, enabled: bool },
}

/// Everything the controller reacts to, in one queue.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Command(Command),
    Envelope { envelope: Envelope, display_name: Option<String> },
    Connectivity(ConnectivityState),
    LocalCandidate(CandidateInit),
    RemoteTracks(TrackSet),
    TimerFired { kind: TimerKind, generation: u64 },
    TransportClosed,
    Shutdown,
}

/// How an inbound call request relates to the current session.
enum RequestDisposition {
    /// No session: start ringing.
    Fresh,
    /// Glare, and our id wins: keep dialing, drop the competing offer.
    GlareProceed,
    /// Glare, and the peer's id wins: abandon our attempt, take theirs.
    GlareYield,
    /// A repeat request from the party we are already talking to.
    Duplicate,
    /// Any other party: we are busy.
    Busy,
}

/// Cloneable handle for feeding the controller.
///
/// Command methods are fire-and-forget sends into the event queue; the
/// outcome is observable on the [`subscribe`](Self::subscribe) channel.
#[derive(Clone)]
pub struct CallControllerHandle {
    local_id: ConnectionId,
    queue: mpsc::UnboundedSender<SessionEvent>,
    events: broadcast::Sender<CallEvent>,
}

impl CallControllerHandle {
    /// Initiate a call to `peer`.
    pub fn call(&self, peer: ConnectionId) {
        self.send(SessionEvent::Command(Command::Call { peer }));
    }

    /// Accept the currently ringing call.
    pub fn accept(&self) {
        self.send(SessionEvent::Command(Command::Accept));
    }

    /// Decline the currently ringing call.
    pub fn decline(&self) {
        self.send(SessionEvent::Command(Command::Decline));
    }

    /// End the current call, whatever state it is in.
    pub fn hang_up(&self) {
        self.send(SessionEvent::Command(Command::HangUp));
    }

    /// Mute or unmute the local audio track.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.send(SessionEvent::Command(Command::SetTrackEnabled {
            kind: TrackKind::Audio,
            enabled,
        }));
    }

    /// Turn the local camera on or off.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.send(SessionEvent::Command(Command::SetTrackEnabled {
            kind: TrackKind::Video,
            enabled,
        }));
    }

    /// Inject an inbound envelope. `display_name` accompanies call
    /// requests, where the relay attaches the caller's registered name.
    pub fn deliver(&self, envelope: Envelope, display_name: Option<String>) {
        self.send(SessionEvent::Envelope { envelope, display_name });
    }

    /// Inject a raw server message; non-call-control messages
    /// (`welcome`, `user-list`) are ignored here.
    pub fn deliver_server_message(&self, message: ServerMessage) {
        if let Some((envelope, display_name)) = message.into_envelope(&self.local_id) {
            self.deliver(envelope, display_name);
        }
    }

    /// Report a connectivity-state transition from the negotiation
    /// engine.
    pub fn connectivity_changed(&self, state: ConnectivityState) {
        self.send(SessionEvent::Connectivity(state));
    }

    /// Forward a locally gathered candidate to the peer.
    pub fn local_candidate(&self, candidate: CandidateInit) {
        self.send(SessionEvent::LocalCandidate(candidate));
    }

    /// Hand over the peer's track set as delivered by the negotiation
    /// engine.
    pub fn remote_tracks(&self, tracks: TrackSet) {
        self.send(SessionEvent::RemoteTracks(tracks));
    }

    /// The signaling channel is gone; any active session terminates
    /// locally.
    pub fn transport_closed(&self) {
        self.send(SessionEvent::TransportClosed);
    }

    /// Stop the controller after cleaning up any active session.
    pub fn shutdown(&self) {
        self.send(SessionEvent::Shutdown);
    }

    /// Subscribe to controller events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    fn send(&self, event: SessionEvent) {
        if self.queue.send(event).is_err() {
            debug!("controller stopped, event dropped");
        }
    }
}

/// The per-party controller. Construct with [`new`](Self::new), then
/// drive it by awaiting [`run`](Self::run) (typically in a spawned
/// task) while the rest of the application talks to the handle.
pub struct CallController {
    local_id: ConnectionId,
    config: CallConfig,
    negotiation: Arc<dyn NegotiationEngine>,
    media: Arc<dyn MediaEngine>,
    transport: Arc<dyn SignalingTransport>,
    events: broadcast::Sender<CallEvent>,
    queue: mpsc::UnboundedReceiver<SessionEvent>,
    queue_tx: mpsc::UnboundedSender<SessionEvent>,
    session: Option<CallSession>,
    timer_seq: u64,
}

impl CallController {
    pub fn new(
        local_id: ConnectionId,
        config: CallConfig,
        negotiation: Arc<dyn NegotiationEngine>,
        media: Arc<dyn MediaEngine>,
        transport: Arc<dyn SignalingTransport>,
    ) -> (Self, CallControllerHandle) {
        let (queue_tx, queue) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let handle = CallControllerHandle {
            local_id: local_id.clone(),
            queue: queue_tx.clone(),
            events: events.clone(),
        };
        let controller = Self {
            local_id,
            config,
            negotiation,
            media,
            transport,
            events,
            queue,
            queue_tx,
            session: None,
            timer_seq: 0,
        };
        (controller, handle)
    }

    /// Process events until [`CallControllerHandle::shutdown`] is called.
    pub async fn run(mut self) {
        while let Some(event) = self.queue.recv().await {
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
            self.process(event).await;
        }
        self.terminate_session(false, "controller shut down").await;
    }

    async fn process(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(command) => self.handle_command(command).await,
            SessionEvent::Envelope { envelope, display_name } => {
                self.handle_envelope(envelope, display_name).await
            }
            SessionEvent::Connectivity(state) => self.handle_connectivity(state).await,
            SessionEvent::LocalCandidate(candidate) => self.handle_local_candidate(candidate).await,
            SessionEvent::RemoteTracks(tracks) => self.handle_remote_tracks(tracks).await,
            SessionEvent::TimerFired { kind, generation } => {
                self.handle_timer(kind, generation).await
            }
            SessionEvent::TransportClosed => self.handle_transport_closed().await,
            SessionEvent::Shutdown => {}
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Call { peer } => self.handle_call(peer).await,
            Command::Accept => self.handle_accept().await,
            Command::Decline => self.handle_decline().await,
            Command::HangUp => self.handle_hang_up().await,
            Command::SetTrackEnabled { kind, enabled } => {
                self.handle_set_track_enabled(kind, enabled).await
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope, display_name: Option<String>) {
        let from = envelope.from;
        match envelope.kind {
            EnvelopeKind::CallRequest(offer) => {
                self.handle_call_request(from, display_name, offer).await
            }
            EnvelopeKind::CallAnswer(answer) => self.handle_call_answer(from, answer).await,
            EnvelopeKind::IceCandidate(candidate) => {
                self.handle_remote_candidate(from, candidate).await
            }
            EnvelopeKind::CallEnd => self.handle_call_end(from).await,
        }
    }

    // ===== outgoing call =====

    async fn handle_call(&mut self, peer: ConnectionId) {
        if self.session.is_some() {
            warn!(%peer, "call rejected: a session is already active");
            self.emit(CallEvent::CallFailed { reason: "a call is already in progress".into() });
            return;
        }
        if peer == self.local_id {
            warn!("call rejected: cannot call self");
            self.emit(CallEvent::CallFailed { reason: "cannot call yourself".into() });
            return;
        }

        info!(%peer, "initiating call");
        self.session = Some(CallSession::outgoing(peer.clone()));
        self.emit_state(CallState::Idle, CallState::Dialing, "user initiated call");

        let tracks = match self.media.acquire_tracks().await {
            Ok(tracks) => tracks,
            Err(err) => {
                return self.fail_session(format!("local media unavailable: {err}"), false).await;
            }
        };
        if let Some(session) = self.session.as_mut() {
            session.local_tracks = Some(tracks);
        }

        let offer = match self.negotiation.create_offer().await {
            Ok(offer) => offer,
            Err(err) => {
                return self.fail_session(format!("building offer failed: {err}"), false).await;
            }
        };
        if let Err(err) = self.negotiation.set_local_description(offer.clone()).await {
            return self.fail_session(format!("applying local offer failed: {err}"), false).await;
        }

        let request = Envelope::call_request(self.local_id.clone(), peer, offer);
        if let Err(err) = self.transport.send(request).await {
            return self.fail_session(format!("sending call request failed: {err}"), false).await;
        }
        self.arm_timer(TimerKind::Negotiation, self.config.negotiation_timeout);
    }

    // ===== inbound call request =====

    async fn handle_call_request(
        &mut self,
        from: ConnectionId,
        display_name: Option<String>,
        offer: SessionDescription,
    ) {
        let disposition = match self.session.as_ref() {
            None => RequestDisposition::Fresh,
            Some(session) if session.peer == from => {
                if session.state == CallState::Dialing {
                    if self.local_id < from {
                        RequestDisposition::GlareProceed
                    } else {
                        RequestDisposition::GlareYield
                    }
                } else {
                    RequestDisposition::Duplicate
                }
            }
            Some(_) => RequestDisposition::Busy,
        };

        match disposition {
            RequestDisposition::Fresh => {
                self.start_ringing(from, display_name, offer, CallState::Idle);
            }
            RequestDisposition::GlareProceed => {
                debug!(peer = %from, "glare: lower id proceeds as caller, dropping competing offer");
            }
            RequestDisposition::GlareYield => {
                info!(peer = %from, "glare: yielding outgoing attempt to peer's offer");
                // No call-end to the peer here: their attempt is the one
                // that survives.
                if let Some(mut outgoing) = self.session.take() {
                    outgoing.timers.cancel_all();
                    self.negotiation.close().await;
                    if let Some(tracks) = outgoing.local_tracks.take() {
                        self.media.release_tracks(tracks).await;
                    }
                }
                self.start_ringing(from, display_name, offer, CallState::Dialing);
            }
            RequestDisposition::Duplicate => {
                warn!(peer = %from, "duplicate call request from current peer ignored");
            }
            RequestDisposition::Busy => {
                debug!(%from, "busy: rejecting call request");
                let rejection = Envelope::call_end(self.local_id.clone(), from);
                if let Err(err) = self.transport.send(rejection).await {
                    debug!(%err, "busy rejection send failed");
                }
            }
        }
    }

    fn start_ringing(
        &mut self,
        from: ConnectionId,
        display_name: Option<String>,
        offer: SessionDescription,
        previous: CallState,
    ) {
        info!(peer = %from, name = display_name.as_deref().unwrap_or(""), "incoming call");
        self.session = Some(CallSession::incoming(from.clone(), display_name.clone(), offer));
        self.arm_timer(TimerKind::Negotiation, self.config.negotiation_timeout);
        self.emit_state(previous, CallState::Ringing, "call request received");
        self.emit(CallEvent::IncomingCall { from, display_name });
    }

    // ===== accept / decline =====

    async fn handle_accept(&mut self) {
        let ringing = match self.session.as_mut() {
            Some(session)
                if session.direction == CallDirection::Incoming
                    && session.state == CallState::Ringing =>
            {
                Some((session.peer.clone(), session.pending_offer.take()))
            }
            _ => None,
        };
        let (peer, offer) = match ringing {
            Some((peer, Some(offer))) => (peer, offer),
            Some((_, None)) => {
                return self.fail_session("ringing session lost its offer".into(), true).await;
            }
            None => {
                warn!("accept ignored: no ringing session");
                return;
            }
        };

        let tracks = match self.media.acquire_tracks().await {
            Ok(tracks) => tracks,
            Err(err) => {
                return self.fail_session(format!("local media unavailable: {err}"), true).await;
            }
        };
        if let Some(session) = self.session.as_mut() {
            session.local_tracks = Some(tracks);
        }

        if let Err(err) = self.negotiation.set_remote_description(offer).await {
            return self.fail_session(format!("applying offer failed: {err}"), true).await;
        }
        self.mark_remote_description_set();
        self.flush_pending_candidates().await;

        let answer = match self.negotiation.create_answer().await {
            Ok(answer) => answer,
            Err(err) => {
                return self.fail_session(format!("building answer failed: {err}"), true).await;
            }
        };
        if let Err(err) = self.negotiation.set_local_description(answer.clone()).await {
            return self.fail_session(format!("applying local answer failed: {err}"), true).await;
        }
        let reply = Envelope::call_answer(self.local_id.clone(), peer, answer);
        if let Err(err) = self.transport.send(reply).await {
            return self.fail_session(format!("sending answer failed: {err}"), false).await;
        }

        self.cancel_timer(TimerKind::Negotiation);
        self.transition(CallState::Negotiating, "call accepted");
    }

    async fn handle_decline(&mut self) {
        let ringing = matches!(
            self.session.as_ref(),
            Some(session)
                if session.direction == CallDirection::Incoming
                    && session.state == CallState::Ringing
        );
        if !ringing {
            warn!("decline ignored: no ringing session");
            return;
        }
        self.terminate_session(true, "call declined").await;
    }

    // ===== answer / candidates / teardown from the peer =====

    async fn handle_call_answer(&mut self, from: ConnectionId, answer: SessionDescription) {
        let dialing_this_peer = matches!(
            self.session.as_ref(),
            Some(session) if session.peer == from && session.state == CallState::Dialing
        );
        if !dialing_this_peer {
            warn!(peer = %from, "ignoring unexpected call answer");
            return;
        }

        if let Err(err) = self.negotiation.set_remote_description(answer).await {
            return self.fail_session(format!("applying answer failed: {err}"), true).await;
        }
        self.mark_remote_description_set();
        self.flush_pending_candidates().await;
        self.cancel_timer(TimerKind::Negotiation);
        self.transition(CallState::Negotiating, "answer received");
    }

    async fn handle_remote_candidate(&mut self, from: ConnectionId, candidate: CandidateInit) {
        enum Action {
            Apply,
            Buffered,
            Ignore,
        }
        let action = match self.session.as_mut() {
            Some(session) if session.peer == from => {
                if session.remote_description_set {
                    Action::Apply
                } else {
                    session.pending_candidates.push_back(candidate.clone());
                    debug!(
                        peer = %from,
                        buffered = session.pending_candidates.len(),
                        "buffered candidate before remote description"
                    );
                    Action::Buffered
                }
            }
            _ => Action::Ignore,
        };
        match action {
            Action::Apply => {
                if let Err(err) = self.negotiation.add_ice_candidate(candidate).await {
                    warn!(%err, "failed to apply candidate, skipping");
                }
            }
            Action::Buffered => {}
            Action::Ignore => debug!(peer = %from, "candidate without matching session ignored"),
        }
    }

    async fn handle_call_end(&mut self, from: ConnectionId) {
        let state = match self.session.as_ref() {
            Some(session) if session.peer == from => session.state,
            Some(_) => {
                debug!(%from, "call-end from non-peer ignored");
                return;
            }
            None => {
                debug!(%from, "call-end with no session ignored");
                return;
            }
        };

        if state == CallState::Dialing {
            // The callee never rang for us: it was busy or declined.
            self.emit(CallEvent::PeerBusy { peer: from });
            self.terminate_session(false, "peer busy or declined").await;
        } else {
            self.emit(CallEvent::CallEnded { peer: from, by_peer: true });
            self.terminate_session(false, "peer ended the call").await;
        }
    }

    // ===== local teardown and media control =====

    async fn handle_hang_up(&mut self) {
        let Some(peer) = self.session.as_ref().map(|session| session.peer.clone()) else {
            debug!("hang-up with no active session");
            return;
        };
        self.emit(CallEvent::CallEnded { peer, by_peer: false });
        self.terminate_session(true, "user ended the call").await;
    }

    async fn handle_set_track_enabled(&mut self, kind: TrackKind, enabled: bool) {
        let Some(tracks) =
            self.session.as_ref().and_then(|session| session.local_tracks.clone())
        else {
            debug!(?kind, "no local tracks to toggle");
            return;
        };
        self.media.set_track_enabled(&tracks, kind, enabled).await;
    }

    // ===== connectivity and recovery =====

    async fn handle_connectivity(&mut self, state: ConnectivityState) {
        let Some(current) = self.session.as_ref().map(|session| session.state) else {
            debug!(?state, "connectivity report with no session ignored");
            return;
        };

        match state {
            ConnectivityState::Connected | ConnectivityState::Completed => match current {
                CallState::Negotiating | CallState::Reconnecting | CallState::Connected => {
                    if let Some(session) = self.session.as_mut() {
                        session.timers.cancel_all();
                        session.connection_attempts = 0;
                    }
                    if current != CallState::Connected {
                        self.transition(CallState::Connected, "connectivity established");
                    }
                }
                _ => debug!(?state, ?current, "connectivity report ignored in this state"),
            },
            ConnectivityState::Disconnected => {
                if current == CallState::Connected {
                    self.arm_timer(TimerKind::ReconnectGrace, self.config.reconnect_grace);
                    self.transition(CallState::Reconnecting, "connectivity lost");
                } else {
                    debug!(?current, "disconnect report ignored in this state");
                }
            }
            ConnectivityState::Failed => self.handle_connectivity_failed().await,
            ConnectivityState::Closed => {
                self.terminate_session(false, "peer connection closed").await;
            }
            ConnectivityState::New | ConnectivityState::Checking => {}
        }
    }

    async fn handle_connectivity_failed(&mut self) {
        let attempts =
            self.session.as_ref().map(|session| session.connection_attempts).unwrap_or(0);
        if attempts < self.config.max_connection_attempts {
            if let Some(session) = self.session.as_mut() {
                session.connection_attempts += 1;
            }
            info!(
                attempt = attempts + 1,
                max = self.config.max_connection_attempts,
                "connectivity failed, requesting ICE restart"
            );
            if let Err(err) = self.negotiation.restart_ice().await {
                self.fail_session(format!("ICE restart failed: {err}"), true).await;
            }
        } else {
            self.emit(CallEvent::CallFailed {
                reason: format!("connection failed after {attempts} restart attempts"),
            });
            self.terminate_session(true, "connectivity retries exhausted").await;
        }
    }

    // ===== candidates outbound, remote media, timers, transport =====

    async fn handle_local_candidate(&mut self, candidate: CandidateInit) {
        let Some(peer) = self.session.as_ref().map(|session| session.peer.clone()) else {
            debug!("local candidate with no session dropped");
            return;
        };
        let envelope = Envelope::ice_candidate(self.local_id.clone(), peer, candidate);
        if let Err(err) = self.transport.send(envelope).await {
            warn!(%err, "failed to forward local candidate");
        }
    }

    async fn handle_remote_tracks(&mut self, tracks: TrackSet) {
        if self.session.is_none() {
            debug!("remote tracks with no session dropped");
            return;
        }
        self.media.render_remote(tracks.clone()).await;
        self.emit(CallEvent::RemoteTracks { tracks });
    }

    async fn handle_timer(&mut self, kind: TimerKind, generation: u64) {
        let state = {
            let Some(session) = self.session.as_mut() else { return };
            if !session.timers.acknowledge(kind, generation) {
                debug!(?kind, generation, "stale timer ignored");
                return;
            }
            session.state
        };

        match kind {
            TimerKind::Negotiation => match state {
                CallState::Dialing => {
                    self.emit(CallEvent::CallFailed { reason: "no answer".into() });
                    self.terminate_session(true, "negotiation timed out").await;
                }
                CallState::Ringing => {
                    self.terminate_session(true, "unanswered ring timed out").await;
                }
                _ => debug!(?state, "negotiation timer fired in unexpected state"),
            },
            TimerKind::ReconnectGrace => {
                if state == CallState::Reconnecting {
                    self.emit(CallEvent::CallFailed { reason: "connection lost".into() });
                    self.terminate_session(true, "reconnect grace expired").await;
                } else {
                    debug!(?state, "grace timer fired in unexpected state");
                }
            }
        }
    }

    async fn handle_transport_closed(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.emit(CallEvent::CallFailed { reason: "signaling transport closed".into() });
        self.terminate_session(false, "signaling transport closed").await;
    }

    // ===== shared machinery =====

    /// Tear the session down completely: timers aborted, engine closed,
    /// tracks released, buffers dropped with the session itself. The
    /// single optional `call-end` here is the only one a termination
    /// path ever sends.
    async fn terminate_session(&mut self, send_end: bool, reason: &str) {
        let Some(mut session) = self.session.take() else { return };
        session.timers.cancel_all();
        let previous = session.state;

        if send_end {
            let envelope = Envelope::call_end(self.local_id.clone(), session.peer.clone());
            if let Err(err) = self.transport.send(envelope).await {
                debug!(%err, "best-effort call-end notification failed");
            }
        }
        self.negotiation.close().await;
        if let Some(tracks) = session.local_tracks.take() {
            self.media.release_tracks(tracks).await;
        }

        info!(
            peer = %session.peer,
            name = session.peer_name.as_deref().unwrap_or(""),
            reason,
            "call session terminated"
        );
        self.emit_state(previous, CallState::Terminated, reason);
    }

    async fn fail_session(&mut self, reason: String, send_end: bool) {
        warn!(%reason, "call session failed");
        self.emit(CallEvent::CallFailed { reason: reason.clone() });
        self.terminate_session(send_end, &reason).await;
    }

    async fn flush_pending_candidates(&mut self) {
        loop {
            let candidate = match self
                .session
                .as_mut()
                .and_then(|session| session.pending_candidates.pop_front())
            {
                Some(candidate) => candidate,
                None => break,
            };
            if let Err(err) = self.negotiation.add_ice_candidate(candidate).await {
                warn!(%err, "failed to apply buffered candidate, skipping");
            }
        }
    }

    fn mark_remote_description_set(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.remote_description_set = true;
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, duration: Duration) {
        self.timer_seq += 1;
        let generation = self.timer_seq;
        let queue = self.queue_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = queue.send(SessionEvent::TimerFired { kind, generation });
        });
        match self.session.as_mut() {
            Some(session) => {
                session.timers.arm(kind, TimerHandle { generation, abort: task.abort_handle() });
            }
            None => task.abort(),
        }
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        if let Some(session) = self.session.as_mut() {
            session.timers.cancel(kind);
        }
    }

    fn transition(&mut self, new_state: CallState, reason: &str) {
        if let Some(session) = self.session.as_mut() {
            let previous = session.set_state(new_state);
            self.emit_state(previous, new_state, reason);
        }
    }

    fn emit_state(&self, previous: CallState, current: CallState, reason: &str) {
        self.emit(CallEvent::StateChanged {
            previous,
            current,
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }
}
