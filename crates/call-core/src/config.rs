//! Controller configuration
//!
//! The timeout and retry values here are the canonical recovery policy;
//! deviations are product decisions, not bugs.

use std::time::Duration;

/// Configuration for a call session controller.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use rtcall_call_core::CallConfig;
///
/// let config = CallConfig::new()
///     .with_negotiation_timeout(Duration::from_secs(20))
///     .with_max_connection_attempts(5);
/// assert_eq!(config.max_connection_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// How long an unanswered outgoing or incoming call may ring.
    pub negotiation_timeout: Duration,
    /// How long a disconnected call may try to come back before the
    /// session is abandoned.
    pub reconnect_grace: Duration,
    /// How many ICE restarts are attempted after connectivity failures.
    pub max_connection_attempts: u32,
    /// STUN server URIs for the application to hand its negotiation
    /// engine. Connectivity-establishment assistance only; no TURN.
    pub stun_servers: Vec<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: Duration::from_secs(30),
            reconnect_grace: Duration::from_secs(10),
            max_connection_attempts: 3,
            stun_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
        }
    }
}

impl CallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long an unanswered call rings before terminating.
    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    /// Set the reconnection grace period.
    pub fn with_reconnect_grace(mut self, grace: Duration) -> Self {
        self.reconnect_grace = grace;
        self
    }

    /// Set the ICE restart budget.
    pub fn with_max_connection_attempts(mut self, attempts: u32) -> Self {
        self.max_connection_attempts = attempts;
        self
    }

    /// Replace the STUN server list.
    pub fn with_stun_servers(mut self, servers: Vec<String>) -> Self {
        self.stun_servers = servers;
        self
    }
}
