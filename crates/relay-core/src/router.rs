//! Envelope forwarding
//!
//! [`SignalingRelay::route`] is the whole relay contract: look the
//! target up in the presence registry, forward to the target only, and
//! drop silently when the target is unreachable. Signaling data is
//! ephemeral and only meaningful to a live peer; queuing it would let a
//! stale call request wake up a session that no longer has matching
//! state.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use rtcall_presence_core::PresenceRegistry;
use rtcall_signal_core::{ConnectionId, Envelope, EnvelopeKind, ServerMessage};

/// Per-connection outbound sink.
pub type MessageSink = mpsc::UnboundedSender<ServerMessage>;

/// Stateless envelope forwarder.
///
/// The sink table maps connection ids to their outbound channels; the
/// registry decides reachability. Neither holds anything about calls.
pub struct SignalingRelay {
    registry: Arc<PresenceRegistry>,
    sinks: DashMap<ConnectionId, MessageSink>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<PresenceRegistry>) -> Arc<Self> {
        Arc::new(Self { registry, sinks: DashMap::new() })
    }

    /// Register a connection's outbound sink.
    pub fn attach(&self, connection_id: ConnectionId, sink: MessageSink) {
        self.sinks.insert(connection_id, sink);
    }

    /// Drop a connection's outbound sink.
    pub fn detach(&self, connection_id: &ConnectionId) {
        self.sinks.remove(connection_id);
    }

    /// Forward one envelope to its target, or drop it.
    ///
    /// `envelope.from` must already be the relay's own record of the
    /// sending connection (see `Envelope::from_client`). No error is
    /// returned to the sender on a drop; an unanswered caller times out
    /// through its own negotiation policy.
    pub fn route(&self, envelope: Envelope) {
        let kind = envelope.signal_kind();
        if !self.registry.is_reachable(&envelope.to) {
            debug!(%kind, from = %envelope.from, to = %envelope.to, "target unreachable, dropping envelope");
            return;
        }

        // A call request is the one place the target needs a human name
        // before any session exists on its side.
        let from_name = match envelope.kind {
            EnvelopeKind::CallRequest(_) => self.registry.display_name(&envelope.from),
            _ => None,
        };

        let to = envelope.to.clone();
        let from = envelope.from.clone();
        let message = ServerMessage::from_envelope(envelope, from_name);
        match self.sinks.get(&to) {
            Some(sink) => {
                trace!(%kind, %from, %to, "forwarding envelope");
                let _ = sink.send(message);
            }
            // Registered but sink already torn down: the disconnect is
            // in flight, treat as unreachable.
            None => debug!(%kind, %from, %to, "no sink for target, dropping envelope"),
        }
    }
}
