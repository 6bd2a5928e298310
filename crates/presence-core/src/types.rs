//! Registry entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rtcall_signal_core::ConnectionId;

pub use rtcall_signal_core::PartyStatus;

/// One registered party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// Connection identity assigned by the relay at connect time.
    pub connection_id: ConnectionId,
    /// Name the party registered under.
    pub display_name: String,
    /// Always [`PartyStatus::Online`] while the entry exists; the entry
    /// is removed on disconnect. Kept because clients render it.
    pub status: PartyStatus,
    /// When the party first registered on this connection.
    pub registered_at: DateTime<Utc>,
}

impl Party {
    pub fn online(connection_id: ConnectionId, display_name: impl Into<String>) -> Self {
        Self {
            connection_id,
            display_name: display_name.into(),
            status: PartyStatus::Online,
            registered_at: Utc::now(),
        }
    }
}
