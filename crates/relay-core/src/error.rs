//! Error types for the relay

use std::net::SocketAddr;

use thiserror::Error;

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while running the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Could not bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept/serve loop failed
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
