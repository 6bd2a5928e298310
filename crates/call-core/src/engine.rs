//! Collaborator interfaces
//!
//! The controller owns signaling state only. Turning descriptions and
//! candidates into an actual media path is the negotiation engine's job
//! (browser-native WebRTC in the reference deployment), and capturing or
//! rendering media is the media engine's. Both are supplied by the
//! application.

use async_trait::async_trait;

use rtcall_signal_core::{CandidateInit, SessionDescription};

use crate::error::Result;

/// Which kind of track inside a track set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// An opaque handle to a set of media tracks.
///
/// The controller never looks inside; it only threads the handle between
/// the media engine (capture, render, release) and the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSet {
    /// Identifier the media engine uses to address this set.
    pub id: String,
}

impl TrackSet {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The network negotiation primitives.
///
/// One logical peer connection at a time: [`close`](Self::close) ends the
/// current one, and the next `create_offer`/`set_remote_description`
/// starts fresh. Errors from description building or application are
/// treated as fatal to the session by the controller — they indicate a
/// non-transient local fault and are not retried.
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Apply a remote candidate. Must only be called once a remote
    /// description is set; the controller buffers candidates until then.
    async fn add_ice_candidate(&self, candidate: CandidateInit) -> Result<()>;

    /// Request an ICE restart on the current connection.
    async fn restart_ice(&self) -> Result<()>;

    /// Tear down the current peer connection. Infallible by contract;
    /// there is nothing useful a caller could do with a close error.
    async fn close(&self);
}

/// Local media capture and remote rendering.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Obtain the local track set for a call.
    async fn acquire_tracks(&self) -> Result<TrackSet>;

    /// Release a previously acquired local track set.
    async fn release_tracks(&self, tracks: TrackSet);

    /// Hand off a received remote track set for rendering.
    async fn render_remote(&self, tracks: TrackSet);

    /// Enable or disable one kind of track in a local set (mute,
    /// camera off).
    async fn set_track_enabled(&self, tracks: &TrackSet, kind: TrackKind, enabled: bool);
}
