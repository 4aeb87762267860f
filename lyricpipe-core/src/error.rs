use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please edit it with your Spotify credentials and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Pipeline errors
    #[error("{service} unavailable: {reason}")]
    SourceUnavailable { service: String, reason: String },

    #[error("No track is currently playing")]
    NoActiveTrack,

    #[error("Lyrics not found for track: {track_id}")]
    LyricsNotFound { track_id: String },

    #[error("{provider} transformation unavailable: {reason}")]
    TransformationUnavailable { provider: String, reason: String },

    #[error("Spotify session expired ({reason}). Run `lyricpipe login` to authorize again.")]
    FatalAuthExpired { reason: String },

    #[error("{operation} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Output stream closed: {0}")]
    SinkClosed(#[source] std::io::Error),

    // Transport errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Network request failed: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    #[error("Failed to decode response: {0}")]
    JsonError(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Shorthand for [`CoreError::SourceUnavailable`].
    pub fn source_unavailable(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must stop the pipeline.
    ///
    /// Everything else is recovered from at the orchestrator boundary.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalAuthExpired { .. } | Self::SinkClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(CoreError::FatalAuthExpired {
            reason: "invalid_grant".into()
        }
        .is_fatal());
        assert!(CoreError::SinkClosed(std::io::ErrorKind::BrokenPipe.into()).is_fatal());

        assert!(!CoreError::NoActiveTrack.is_fatal());
        assert!(!CoreError::source_unavailable("spotify", "503").is_fatal());
        assert!(!CoreError::LyricsNotFound {
            track_id: "abc".into()
        }
        .is_fatal());
        assert!(!CoreError::Timeout {
            operation: "lyrics fetch",
            timeout: Duration::from_secs(10),
        }
        .is_fatal());
    }

    #[test]
    fn test_timeout_message() {
        let err = CoreError::Timeout {
            operation: "playback poll",
            timeout: Duration::from_millis(5000),
        };
        assert_eq!(err.to_string(), "playback poll timed out after 5000ms");
    }
}
