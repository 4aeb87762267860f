//! Spotify playback state polling.

use crate::error::SpotifyError;
use crate::oauth::SpotifyOAuth;
use async_trait::async_trait;
use lyricpipe_core::{CoreError, PlaybackSource, PlaybackState, TrackInfo};
use rspotify::model::{CurrentPlaybackContext, PlayableItem};
use rspotify::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Spotify playback state poller implementing [`PlaybackSource`].
///
/// Issues exactly one request per call; pacing is left to the caller.
pub struct SpotifyPoller {
    oauth: Arc<SpotifyOAuth>,
}

impl SpotifyPoller {
    #[must_use]
    pub const fn new(oauth: Arc<SpotifyOAuth>) -> Self {
        Self { oauth }
    }
}

#[async_trait]
impl PlaybackSource for SpotifyPoller {
    fn name(&self) -> &'static str {
        "spotify"
    }

    async fn current_playback(&self) -> Result<PlaybackState, CoreError> {
        // Proactively refresh token if it expires within 60 seconds
        self.oauth.ensure_token_fresh().await?;

        let request_start = Instant::now();

        let playback = self
            .oauth
            .client()
            .current_playback(None, None::<Vec<_>>)
            .await
            .map_err(SpotifyError::from)?;

        let request_latency = request_start.elapsed();

        let context = playback.ok_or(SpotifyError::NoActivePlayback)?;
        let state = playback_state(&context, request_latency)?;

        debug!(
            "Polled Spotify: playing={}, track={}, position={:?}",
            state.is_playing, state.track, state.position
        );

        Ok(state)
    }
}

/// Convert a playback context into a [`PlaybackState`].
fn playback_state(
    context: &CurrentPlaybackContext,
    request_latency: Duration,
) -> Result<PlaybackState, SpotifyError> {
    let track = match &context.item {
        Some(PlayableItem::Track(track)) => {
            let artists: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
            let artist = join_artists(&artists);
            let duration = track.duration.to_std().unwrap_or(Duration::ZERO);
            // Use just the ID part, not the full URI (spotify:track:xxx -> xxx)
            let track_id = track.id.as_ref().map_or_else(
                || local_track_id(&artist, &track.album.name, &track.name, duration),
                |id| id.id().to_string(),
            );
            TrackInfo::new(track_id, &track.name, artist, duration)
        }
        Some(PlayableItem::Episode(episode)) => TrackInfo::new(
            episode.id.id(),
            &episode.name,
            &episode.show.name,
            episode.duration.to_std().unwrap_or(Duration::ZERO),
        ),
        None => return Err(SpotifyError::NoActivePlayback),
    };

    let progress = context
        .progress
        .and_then(|p| p.to_std().ok());

    Ok(PlaybackState::new(
        track,
        compensate_latency(progress, request_latency),
        context.is_playing,
    ))
}

/// Assume the reported progress was sampled halfway through the request.
fn compensate_latency(progress: Option<Duration>, request_latency: Duration) -> Duration {
    progress.map_or(Duration::ZERO, |p| p + request_latency / 2)
}

/// Local files have no Spotify ID; key them like Spotify's `spotify:local:` URIs.
fn local_track_id(artist: &str, album: &str, name: &str, duration: Duration) -> String {
    format!("spotify:local:{artist}:{album}:{name}:{}", duration.as_secs())
}

fn join_artists(artists: &[&str]) -> String {
    artists.join(", ")
}
