//! Collaborator traits for the external services the pipeline reads from.

use crate::document::LyricDocument;
use crate::error::Result;
use crate::playback::PlaybackState;
use async_trait::async_trait;

/// Supplies a valid access token on demand.
///
/// Token refresh is opaque to the pipeline. Implementations return
/// [`CoreError::SourceUnavailable`](crate::CoreError::SourceUnavailable) for transient
/// failures and [`CoreError::FatalAuthExpired`](crate::CoreError::FatalAuthExpired) when
/// the session cannot be recovered without re-authorizing.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a bearer token, refreshing it first if it is about to expire.
    async fn access_token(&self) -> Result<String>;

    /// Drop the cached token after the server rejected it, so the next
    /// [`access_token`](Self::access_token) call fetches a new one.
    async fn invalidate(&self) {}
}

/// Reports what the connected player is doing.
///
/// Called once per poll tick. Implementations must not retry internally: the
/// poll delay is the only throttle on outbound requests.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &'static str;

    /// Fetch the current track and elapsed offset.
    ///
    /// Fails with `NoActiveTrack` when nothing is playing, `SourceUnavailable` on
    /// network or API failures and `FatalAuthExpired` when credentials are gone.
    async fn current_playback(&self) -> Result<PlaybackState>;
}

/// Fetches lyrics for a track.
#[async_trait]
pub trait LyricsSource: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &'static str;

    /// Fetch the lyric document for `track_id`.
    ///
    /// Fails with `LyricsNotFound` when the provider has no lyrics for the
    /// track, or `SourceUnavailable` when it cannot be reached.
    async fn fetch_lyrics(&self, track_id: &str) -> Result<LyricDocument>;
}
