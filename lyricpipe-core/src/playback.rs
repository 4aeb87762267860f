use std::time::Duration;

/// Playback state reported by a single poll of the music player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    /// Track being played
    pub track: TrackInfo,
    /// Elapsed offset into the track
    pub position: Duration,
    /// Whether music is currently playing (false when paused)
    pub is_playing: bool,
}

impl PlaybackState {
    /// Create a new playback state
    #[must_use]
    pub const fn new(track: TrackInfo, position: Duration, is_playing: bool) -> Self {
        Self {
            track,
            position,
            is_playing,
        }
    }

    /// Whether this state refers to `track`, regardless of position
    #[must_use]
    pub fn same_track(&self, track: &TrackInfo) -> bool {
        self.track.id == track.id
    }
}

/// Information about the currently playing track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Source-specific track ID, used to fetch lyrics
    pub id: String,
    /// Track name
    pub name: String,
    /// Artist name(s)
    pub artist: String,
    /// Track duration
    pub duration: Duration,
}

impl TrackInfo {
    /// Create a new track info
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artist: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: artist.into(),
            duration,
        }
    }
}

impl std::fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({})", self.artist, self.name, self.id)
    }
}
