//! In-memory presence registry
//!
//! Mutation and the snapshot it broadcasts happen under one write
//! guard, so every published snapshot is the registry exactly as of its
//! triggering event — concurrent events may publish in either order,
//! but no snapshot is ever a torn mix of two states.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use rtcall_signal_core::ConnectionId;

use crate::types::Party;

/// Capacity of the snapshot broadcast channel. A lagged subscriber only
/// skips intermediate snapshots; the next one it sees is complete.
const BROADCAST_CAPACITY: usize = 64;

/// Events published by the registry.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// Full presence snapshot, ordered by registration time.
    Snapshot(Vec<Party>),
}

/// The server-side table of currently reachable parties.
///
/// Created once at server start and shared behind an [`Arc`]; all
/// mutation goes through [`register`](Self::register) and
/// [`remove`](Self::remove).
pub struct PresenceRegistry {
    parties: RwLock<HashMap<ConnectionId, Party>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl PresenceRegistry {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Arc::new(Self { parties: RwLock::new(HashMap::new()), events })
    }

    /// Subscribe to snapshot broadcasts.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Insert or overwrite the entry for `connection_id` and broadcast
    /// the resulting snapshot. Idempotent per connection id;
    /// re-registering updates the display name and keeps the original
    /// registration time.
    pub fn register(&self, connection_id: ConnectionId, display_name: impl Into<String>) {
        let display_name = display_name.into();
        let snapshot = {
            let mut parties = self.parties.write();
            parties
                .entry(connection_id.clone())
                .and_modify(|party| party.display_name = display_name.clone())
                .or_insert_with(|| Party::online(connection_id.clone(), display_name.clone()));
            Self::snapshot_locked(&parties)
        };
        debug!(id = %connection_id, name = %display_name, online = snapshot.len(), "party registered");
        let _ = self.events.send(RegistryEvent::Snapshot(snapshot));
    }

    /// Delete the entry for `connection_id` and broadcast the resulting
    /// snapshot. No-op (and no broadcast) when the id is absent, which
    /// absorbs duplicate disconnect signals.
    pub fn remove(&self, connection_id: &ConnectionId) {
        let snapshot = {
            let mut parties = self.parties.write();
            if parties.remove(connection_id).is_none() {
                return;
            }
            Self::snapshot_locked(&parties)
        };
        debug!(id = %connection_id, online = snapshot.len(), "party removed");
        let _ = self.events.send(RegistryEvent::Snapshot(snapshot));
    }

    /// Whether an entry exists for `connection_id`. Never blocks on
    /// another party's in-flight work.
    pub fn is_reachable(&self, connection_id: &ConnectionId) -> bool {
        self.parties.read().contains_key(connection_id)
    }

    /// The registered display name for `connection_id`, if any.
    pub fn display_name(&self, connection_id: &ConnectionId) -> Option<String> {
        self.parties.read().get(connection_id).map(|party| party.display_name.clone())
    }

    /// Point-in-time consistent listing, ordered by registration time.
    pub fn snapshot(&self) -> Vec<Party> {
        Self::snapshot_locked(&self.parties.read())
    }

    fn snapshot_locked(parties: &HashMap<ConnectionId, Party>) -> Vec<Party> {
        let mut entries: Vec<Party> = parties.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.connection_id.cmp(&b.connection_id))
        });
        entries
    }
}
