use lyricpipe_core::CoreError;
use thiserror::Error;

/// Error type for Spotify session and playback operations.
///
/// Converted into [`CoreError`] at the crate boundary so the pipeline only
/// sees its own taxonomy.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Authentication failed during the authorization flow or token exchange.
    #[error("Spotify authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// The session has no usable token and must be re-authorized.
    #[error("Spotify session expired: {reason}")]
    TokenExpired { reason: String },

    /// No active Spotify playback on any device.
    #[error("Spotify playback not active on any device")]
    NoActivePlayback,

    /// Error from the Spotify API client.
    #[error("Spotify API error: {0}")]
    Api(#[from] rspotify::ClientError),

    /// Failed to read or write the token cache file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize the token cache.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP status code behind a Spotify client error, if the server answered at all.
#[must_use]
pub fn http_status(error: &rspotify::ClientError) -> Option<u16> {
    match error {
        rspotify::ClientError::Http(http) => match http.as_ref() {
            rspotify::http::HttpError::StatusCode(response) => Some(response.status().as_u16()),
            rspotify::http::HttpError::Client(_) => None,
        },
        _ => None,
    }
}

impl From<SpotifyError> for CoreError {
    fn from(error: SpotifyError) -> Self {
        match error {
            SpotifyError::AuthFailed { reason } | SpotifyError::TokenExpired { reason } => {
                Self::FatalAuthExpired { reason }
            }
            SpotifyError::NoActivePlayback => Self::NoActiveTrack,
            SpotifyError::Api(e) => Self::source_unavailable("spotify", e),
            SpotifyError::Io(e) => Self::IoError(e),
            SpotifyError::Json(e) => Self::source_unavailable("spotify", e),
        }
    }
}

/// Convenience type alias for Results with `SpotifyError`.
pub type Result<T> = std::result::Result<T, SpotifyError>;
