//! # rtcall presence-core
//!
//! The presence registry: the server-side table of currently reachable
//! parties. The registry owns the only shared mutable state on the
//! server; the relay reads it through [`PresenceRegistry::is_reachable`]
//! and display-name lookups, and every mutation publishes a full
//! snapshot to broadcast subscribers.

pub mod registry;
pub mod types;

pub use registry::{PresenceRegistry, RegistryEvent};
pub use types::{Party, PartyStatus};
