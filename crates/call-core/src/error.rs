//! Error types for the call controller

use thiserror::Error;

/// Result type for call-core operations.
pub type Result<T> = std::result::Result<T, CallError>;

/// Errors surfaced by the controller's collaborators.
///
/// Negotiation and media faults are fatal to the current session (a
/// malformed local description or a failed capture indicates a
/// non-transient local fault); transport faults are best-effort
/// except during call setup.
#[derive(Debug, Error)]
pub enum CallError {
    /// Negotiation engine failed building or applying a description
    #[error("negotiation error: {reason}")]
    Negotiation { reason: String },

    /// Media engine failed acquiring or controlling tracks
    #[error("media error: {reason}")]
    Media { reason: String },

    /// Signaling transport failed to send
    #[error("transport error: {reason}")]
    Transport { reason: String },
}

impl CallError {
    /// Create a negotiation error
    pub fn negotiation(reason: impl Into<String>) -> Self {
        Self::Negotiation { reason: reason.into() }
    }

    /// Create a media error
    pub fn media(reason: impl Into<String>) -> Self {
        Self::Media { reason: reason.into() }
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport { reason: reason.into() }
    }
}
