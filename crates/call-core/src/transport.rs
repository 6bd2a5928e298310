//! Signaling transport seam

use async_trait::async_trait;

use rtcall_signal_core::Envelope;

use crate::error::Result;

/// Outbound half of the persistent signaling channel.
///
/// Delivery is best-effort: the relay drops envelopes for unreachable
/// targets without telling the sender, so a successful send proves
/// nothing about arrival. The controller treats send failures as fatal
/// only during call setup; teardown notifications never block cleanup.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<()>;
}
