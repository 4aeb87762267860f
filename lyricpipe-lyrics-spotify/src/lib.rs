//! Spotify color-lyrics source.
//!
//! Uses the lyrics endpoint of the Spotify web player. The endpoint only
//! accepts web-player tokens, which are issued for the `sp_dc` cookie of a
//! logged-in browser session (see [`WebSessionTokens`]). This is an unofficial
//! API and using it may violate Spotify's Terms of Service.

mod session;
mod totp;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lyricpipe_core::{
    AccessTokenProvider, CoreError, DocumentMetadata, LyricDocument, LyricLine, LyricsSource,
    SyncType,
};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub use session::{WebSessionError, WebSessionTokens};

const SPOTIFY_LYRICS_API: &str = "https://spclient.wg.spotify.com/color-lyrics/v2/track";

/// Service name used in errors
const SERVICE: &str = "spotify-lyrics";

/// Default timeout for HTTP requests (5 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 2;
/// User agent for requests
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Spotify lyrics source implementing [`LyricsSource`].
pub struct SpotifyLyricsProvider {
    tokens: Arc<dyn AccessTokenProvider>,
    client: ClientWithMiddleware,
}

impl SpotifyLyricsProvider {
    /// Create a lyrics source authorized by a web-player session.
    ///
    /// # Arguments
    ///
    /// * `sp_dc` - The `sp_dc` cookie of a logged-in open.spotify.com session
    /// * `secret_key_url` - URL of the TOTP secret dictionary
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_web_session(
        sp_dc: impl Into<String>,
        secret_key_url: impl Into<String>,
    ) -> Result<Self, CoreError> {
        warn!(
            "Spotify lyrics use an unofficial web-player API that may violate \
             Spotify's Terms of Service. Use at your own risk."
        );

        let base_client = base_client()?;
        let tokens = WebSessionTokens::new(sp_dc, secret_key_url, base_client.clone());

        Ok(Self::with_client(Arc::new(tokens), base_client))
    }

    /// Create a lyrics source using bearer tokens from `tokens`,
    /// with a 5-second request timeout and 2 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(tokens: Arc<dyn AccessTokenProvider>) -> Result<Self, CoreError> {
        Ok(Self::with_client(tokens, base_client()?))
    }

    fn with_client(tokens: Arc<dyn AccessTokenProvider>, base_client: reqwest::Client) -> Self {
        // Wrap with retry middleware (exponential backoff) for transient failures
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self { tokens, client }
    }

    /// Send request to the lyrics API with the given bearer token.
    async fn send_request(
        &self,
        track_id: &str,
        access_token: String,
    ) -> Result<Attempt<reqwest::Response>, CoreError> {
        let url = format!("{SPOTIFY_LYRICS_API}/{track_id}?format=json&market=from_token");
        debug!("Spotify GET: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("App-Platform", "WebPlayer")
            .send()
            .await
            .map_err(|e| CoreError::source_unavailable(SERVICE, e))?;

        debug!("Spotify response status: {}", response.status());
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized);
        }
        Ok(Attempt::Done(response))
    }
}

fn base_client() -> Result<reqwest::Client, CoreError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Outcome of one authorized request
enum Attempt<T> {
    Done(T),
    Unauthorized,
}

/// Run `send` with a token, retrying once with a fresh token on 401.
///
/// A second 401 means the session itself is rejected and is reported as
/// [`CoreError::FatalAuthExpired`].
async fn with_token_retry<T, F, Fut>(
    tokens: &dyn AccessTokenProvider,
    mut send: F,
) -> Result<T, CoreError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, CoreError>>,
{
    let token = tokens.access_token().await?;
    if let Attempt::Done(value) = send(token).await? {
        return Ok(value);
    }

    warn!("Received 401 Unauthorized, invalidating cached token");
    tokens.invalidate().await;

    let token = tokens.access_token().await?;
    match send(token).await? {
        Attempt::Done(value) => Ok(value),
        Attempt::Unauthorized => Err(CoreError::FatalAuthExpired {
            reason: "lyrics API rejected a freshly issued web-player token".into(),
        }),
    }
}

/// Extract track ID from Spotify URI or URL
///
/// Accepts:
/// - `spotify:track:4iV5W9uYEdYUVa79Axb7Rh`
/// - `https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh?si=...`
/// - `4iV5W9uYEdYUVa79Axb7Rh`
fn extract_track_id(id: &str) -> Option<&str> {
    let id = id.trim();

    let candidate = if let Some(stripped) = id.strip_prefix("spotify:track:") {
        stripped
    } else if let Some((_, rest)) = id.split_once("open.spotify.com/track/") {
        // Remove any query parameters or fragments
        rest.split(['?', '#', '/']).next().unwrap_or(rest)
    } else {
        id
    };

    // Track IDs are 22 base62 characters
    (candidate.len() == 22 && candidate.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(candidate)
}

/// Map a non-success status to the error the pipeline should see.
fn status_error(status: StatusCode, track_id: &str) -> Option<CoreError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::NOT_FOUND => CoreError::LyricsNotFound {
            track_id: track_id.to_string(),
        },
        _ => CoreError::source_unavailable(SERVICE, format!("lyrics API returned status {status}")),
    })
}

#[derive(Debug, Deserialize)]
struct SpotifyLyricsResponse {
    lyrics: SpotifyLyrics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotifyLyrics {
    sync_type: String,
    lines: Vec<SpotifyLyricsLine>,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    provider_lyrics_id: String,
    #[serde(default)]
    provider_display_name: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    sync_lyrics_uri: String,
    #[serde(default)]
    is_dense_typeface: bool,
    #[serde(default)]
    alternatives: Vec<serde_json::Value>,
    #[serde(default)]
    is_rtl_language: bool,
    #[serde(default)]
    fullscreen_action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotifyLyricsLine {
    start_time_ms: String,
    words: String,
    // endTimeMs and syllables exist in the response but are unused
}

/// Convert the API response into a lyric document.
///
/// Empty lines are dropped. "♪" lines are kept: in synced lyrics they mark
/// instrumental breaks and clear the previous line.
fn parse_lyrics(lyrics: SpotifyLyrics, track_id: &str) -> Result<LyricDocument, CoreError> {
    let sync_type = match lyrics.sync_type.as_str() {
        "LINE_SYNCED" | "SYLLABLE_SYNCED" => SyncType::LineSynced,
        "UNSYNCED" => SyncType::Unsynced,
        other => {
            warn!("Unknown Spotify sync type: {}", other);
            return Err(CoreError::LyricsNotFound {
                track_id: track_id.to_string(),
            });
        }
    };

    let lines: Vec<LyricLine> = lyrics
        .lines
        .into_iter()
        .filter(|line| !line.words.trim().is_empty())
        .map(|line| match sync_type {
            SyncType::LineSynced => LyricLine::synced(
                Duration::from_millis(line.start_time_ms.parse().unwrap_or(0)),
                line.words,
            ),
            SyncType::Unsynced => LyricLine::unsynced(line.words),
        })
        .collect();

    if lines.is_empty() {
        return Err(CoreError::LyricsNotFound {
            track_id: track_id.to_string(),
        });
    }

    let metadata = DocumentMetadata {
        provider: lyrics.provider,
        provider_lyrics_id: lyrics.provider_lyrics_id,
        provider_display_name: lyrics.provider_display_name,
        language: lyrics.language,
        sync_lyrics_uri: lyrics.sync_lyrics_uri,
        is_rtl_language: lyrics.is_rtl_language,
        is_dense_typeface: lyrics.is_dense_typeface,
        alternatives: lyrics.alternatives,
        fullscreen_action: lyrics.fullscreen_action,
    };

    Ok(LyricDocument::new(sync_type, lines, metadata))
}

#[async_trait]
impl LyricsSource for SpotifyLyricsProvider {
    fn name(&self) -> &'static str {
        "spotify_lyrics"
    }

    async fn fetch_lyrics(&self, track_id: &str) -> Result<LyricDocument, CoreError> {
        let Some(track_id) = extract_track_id(track_id) else {
            info!("Not a Spotify track ID, skipping lyrics: {:?}", track_id);
            return Err(CoreError::LyricsNotFound {
                track_id: track_id.to_string(),
            });
        };

        let response = with_token_retry(self.tokens.as_ref(), |token| {
            self.send_request(track_id, token)
        })
        .await?;

        if let Some(error) = status_error(response.status(), track_id) {
            if matches!(error, CoreError::LyricsNotFound { .. }) {
                info!("No Spotify lyrics found for track: {}", track_id);
            } else {
                warn!("Spotify lyrics request failed: {}", error);
            }
            return Err(error);
        }

        let result: SpotifyLyricsResponse = response
            .json()
            .await
            .map_err(|e| CoreError::source_unavailable(SERVICE, e))?;

        parse_lyrics(result.lyrics, track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TRACK_ID: &str = "4iV5W9uYEdYUVa79Axb7Rh";

    fn lyrics(json: &str) -> SpotifyLyrics {
        serde_json::from_str::<SpotifyLyricsResponse>(json).unwrap().lyrics
    }

    #[test]
    fn test_extract_track_id() {
        assert_eq!(extract_track_id(TRACK_ID), Some(TRACK_ID));
        assert_eq!(extract_track_id("spotify:track:4iV5W9uYEdYUVa79Axb7Rh"), Some(TRACK_ID));
        assert_eq!(
            extract_track_id("https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh?si=abc"),
            Some(TRACK_ID)
        );
        assert_eq!(extract_track_id(""), None);
        assert_eq!(extract_track_id("spotify:episode:4iV5W9uYEdYUVa79Axb7Rh"), None);
        assert_eq!(extract_track_id("not-an-id"), None);
    }

    #[test]
    fn test_status_error() {
        assert!(status_error(StatusCode::OK, TRACK_ID).is_none());
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, TRACK_ID),
            Some(CoreError::LyricsNotFound { .. })
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, TRACK_ID),
            Some(CoreError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_parse_line_synced() {
        let doc = parse_lyrics(
            lyrics(
                r#"{"lyrics": {
                    "syncType": "LINE_SYNCED",
                    "lines": [
                        {"startTimeMs": "1200", "words": "沈むように溶けてゆくように", "syllables": [], "endTimeMs": "0"},
                        {"startTimeMs": "5400", "words": "♪", "syllables": [], "endTimeMs": "0"},
                        {"startTimeMs": "9000", "words": "", "syllables": [], "endTimeMs": "0"}
                    ],
                    "provider": "MusixMatch",
                    "providerLyricsId": "123",
                    "providerDisplayName": "Musixmatch",
                    "syncLyricsUri": "",
                    "isDenseTypeface": true,
                    "alternatives": [{"language": "en"}],
                    "language": "ja",
                    "isRtlLanguage": false,
                    "fullscreenAction": "FULLSCREEN_LYRICS"
                }, "colors": {}, "hasVocalRemoval": false}"#,
            ),
            TRACK_ID,
        )
        .unwrap();

        assert_eq!(doc.sync_type(), SyncType::LineSynced);
        assert_eq!(doc.lines().len(), 2);
        assert_eq!(doc.lines()[0].start_time(), Some(Duration::from_millis(1200)));
        assert_eq!(doc.lines()[1].text(), "♪");
        assert_eq!(doc.language(), "ja");
        assert_eq!(doc.metadata().provider_display_name, "Musixmatch");
        assert!(doc.metadata().is_dense_typeface);
        assert_eq!(doc.metadata().alternatives.len(), 1);
        assert_eq!(doc.metadata().fullscreen_action.as_deref(), Some("FULLSCREEN_LYRICS"));
    }

    #[test]
    fn test_parse_syllable_synced_as_line_synced() {
        let doc = parse_lyrics(
            lyrics(
                r#"{"lyrics": {"syncType": "SYLLABLE_SYNCED", "lines": [
                    {"startTimeMs": "0", "words": "a"},
                    {"startTimeMs": "1000", "words": "b"}
                ]}}"#,
            ),
            TRACK_ID,
        )
        .unwrap();

        assert_eq!(doc.sync_type(), SyncType::LineSynced);
        assert_eq!(doc.current_line_index(Duration::from_millis(1500)), Some(1));
    }

    #[test]
    fn test_parse_unsynced() {
        let doc = parse_lyrics(
            lyrics(
                r#"{"lyrics": {"syncType": "UNSYNCED", "lines": [
                    {"startTimeMs": "0", "words": "first"},
                    {"startTimeMs": "0", "words": "second"}
                ]}}"#,
            ),
            TRACK_ID,
        )
        .unwrap();

        assert_eq!(doc.sync_type(), SyncType::Unsynced);
        assert!(doc.lines().iter().all(|line| line.start_time().is_none()));
        assert_eq!(doc.lines()[1].text(), "second");
    }

    #[test]
    fn test_parse_empty_or_unknown_is_not_found() {
        let empty = parse_lyrics(
            lyrics(r#"{"lyrics": {"syncType": "LINE_SYNCED", "lines": [{"startTimeMs": "0", "words": " "}]}}"#),
            TRACK_ID,
        );
        assert!(matches!(empty, Err(CoreError::LyricsNotFound { .. })));

        let unknown = parse_lyrics(
            lyrics(r#"{"lyrics": {"syncType": "WORD_SYNCED", "lines": [{"startTimeMs": "0", "words": "a"}]}}"#),
            TRACK_ID,
        );
        assert!(matches!(unknown, Err(CoreError::LyricsNotFound { .. })));
    }

    struct NoToken;

    #[async_trait]
    impl AccessTokenProvider for NoToken {
        async fn access_token(&self) -> Result<String, CoreError> {
            Err(CoreError::FatalAuthExpired {
                reason: "logged out".into(),
            })
        }
    }

    /// Issues "token-0", "token-1", ... and counts invalidations
    #[derive(Default)]
    struct CountingTokens {
        issued: AtomicUsize,
        invalidated: AtomicUsize,
    }

    #[async_trait]
    impl AccessTokenProvider for CountingTokens {
        async fn access_token(&self) -> Result<String, CoreError> {
            Ok(format!("token-{}", self.issued.fetch_add(1, Ordering::SeqCst)))
        }

        async fn invalidate(&self) {
            self.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_unauthorized_retries_with_fresh_token() {
        let tokens = CountingTokens::default();

        let used = with_token_retry(&tokens, |token| async move {
            if token == "token-0" {
                Ok(Attempt::Unauthorized)
            } else {
                Ok(Attempt::Done(token))
            }
        })
        .await
        .unwrap();

        assert_eq!(used, "token-1");
        assert_eq!(tokens.invalidated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authorized_request_keeps_token() {
        let tokens = CountingTokens::default();

        let used = with_token_retry(&tokens, |token| async move { Ok(Attempt::Done(token)) })
            .await
            .unwrap();

        assert_eq!(used, "token-0");
        assert_eq!(tokens.invalidated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persistent_unauthorized_is_fatal() {
        let tokens = CountingTokens::default();
        let requests = AtomicUsize::new(0);

        let err = with_token_retry(&tokens, |_token| {
            requests.fetch_add(1, Ordering::SeqCst);
            async { Ok::<Attempt<()>, CoreError>(Attempt::Unauthorized) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::FatalAuthExpired { .. }));
        assert!(err.is_fatal());
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_id_skips_request() {
        let provider = SpotifyLyricsProvider::new(Arc::new(NoToken)).unwrap();
        let err = provider.fetch_lyrics("local-file").await.unwrap_err();

        assert!(matches!(err, CoreError::LyricsNotFound { .. }));
    }

    #[tokio::test]
    async fn test_expired_session_is_fatal() {
        let provider = SpotifyLyricsProvider::new(Arc::new(NoToken)).unwrap();
        let err = provider.fetch_lyrics(TRACK_ID).await.unwrap_err();

        assert!(err.is_fatal());
    }
}
