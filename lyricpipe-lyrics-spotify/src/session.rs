//! Web-player access tokens for the lyrics endpoint.
//!
//! The lyrics endpoint only accepts tokens issued to the Spotify web player.
//! These are obtained by presenting the `sp_dc` cookie of a logged-in browser
//! session together with a TOTP code derived from a published secret:
//! 1. fetch and decode the latest secret (cached for 24 hours)
//! 2. fetch the Spotify server time
//! 3. exchange `sp_dc` + TOTP for an access token (cached until shortly before expiry)

use crate::totp;
use async_trait::async_trait;
use lyricpipe_core::{AccessTokenProvider, CoreError};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SERVER_TIME_URL: &str = "https://open.spotify.com/api/server-time";
const TOKEN_URL: &str = "https://open.spotify.com/api/token";

/// Service name used in errors
const SERVICE: &str = "spotify-web-token";

/// Refetch the secret dictionary after this long
const SECRET_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Refresh the token when it expires within this many milliseconds
const TOKEN_REFRESH_BUFFER_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum WebSessionError {
    #[error("Failed to fetch server time: {0}")]
    ServerTime(String),

    #[error("Failed to fetch secret key: {0}")]
    SecretKey(String),

    #[error("Secret key dictionary has no numeric versions")]
    SecretDecode,

    #[error("Failed to get web-player token: {0}")]
    TokenFetch(String),

    #[error("sp_dc cookie is invalid or expired")]
    SpDcInvalid,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<WebSessionError> for CoreError {
    fn from(err: WebSessionError) -> Self {
        match err {
            WebSessionError::SpDcInvalid => Self::FatalAuthExpired {
                reason: "Spotify rejected the sp_dc cookie, set a fresh one in [providers.spotify]"
                    .into(),
            },
            other => Self::source_unavailable(SERVICE, other),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at_ms: u64,
}

impl CachedToken {
    const fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_add(TOKEN_REFRESH_BUFFER_MS) >= self.expires_at_ms
    }
}

#[derive(Debug, Clone)]
struct CachedSecret {
    secret: Vec<u8>,
    version: String,
    fetched_at: Instant,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTimeResponse {
    server_time: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    access_token_expiration_timestamp_ms: u64,
    /// Set when the cookie was not accepted
    #[serde(default)]
    is_anonymous: bool,
}

/// Pick the highest numeric version and decode it.
///
/// Each byte is XORed with `(i % 33) + 9`; the decimal renderings of the
/// results are concatenated to form the HMAC key.
fn decode_latest_secret(secrets: HashMap<String, Vec<u8>>) -> Option<(String, Vec<u8>)> {
    let (_, version, original) = secrets
        .into_iter()
        .filter_map(|(key, bytes)| key.parse::<u64>().ok().map(|n| (n, key, bytes)))
        .max_by_key(|(n, _, _)| *n)?;

    let decoded: String = original
        .into_iter()
        .zip((0..33u8).cycle())
        .map(|(byte, i)| (byte ^ (i + 9)).to_string())
        .collect();

    Some((version, decoded.into_bytes()))
}

fn unix_time_ms() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
}

/// Issues and caches web-player tokens for an `sp_dc` session.
pub struct WebSessionTokens {
    sp_dc: String,
    secret_key_url: String,
    client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
    cached_secret: RwLock<Option<CachedSecret>>,
}

impl WebSessionTokens {
    /// Create a token source for the given `sp_dc` cookie.
    ///
    /// # Arguments
    ///
    /// * `sp_dc` - The `sp_dc` cookie of a logged-in open.spotify.com session
    /// * `secret_key_url` - URL of the TOTP secret dictionary
    /// * `client` - HTTP client used for the token exchange
    #[must_use]
    pub fn new(
        sp_dc: impl Into<String>,
        secret_key_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            sp_dc: sp_dc.into(),
            secret_key_url: secret_key_url.into(),
            client,
            cached_token: RwLock::new(None),
            cached_secret: RwLock::new(None),
        }
    }

    async fn token(&self) -> Result<String, WebSessionError> {
        if let Some(token) = self.cached_token.read().await.as_ref() {
            if !token.is_expired(unix_time_ms()) {
                return Ok(token.access_token.clone());
            }
            debug!("Web-player token is expired or expiring soon");
        }

        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, WebSessionError> {
        info!("Refreshing Spotify web-player token");

        let secret = self.secret().await?;
        let server_time = self.server_time().await?;
        let code = totp::generate(&secret.secret, server_time)
            .ok_or_else(|| WebSessionError::TokenFetch("unusable TOTP secret".into()))?;
        debug!("Generated TOTP code with secret version {}", secret.version);

        let token = self
            .exchange(&code, &secret.version, server_time.saturating_mul(1000))
            .await?;
        let access_token = token.access_token.clone();
        *self.cached_token.write().await = Some(token);

        info!("Obtained Spotify web-player token");
        Ok(access_token)
    }

    async fn secret(&self) -> Result<CachedSecret, WebSessionError> {
        if let Some(secret) = self.cached_secret.read().await.as_ref() {
            if secret.fetched_at.elapsed() <= SECRET_MAX_AGE {
                return Ok(secret.clone());
            }
        }

        info!("Fetching TOTP secret from: {}", self.secret_key_url);
        let secrets: HashMap<String, Vec<u8>> = self
            .client
            .get(&self.secret_key_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| WebSessionError::SecretKey(e.to_string()))?
            .json()
            .await
            .map_err(|e| WebSessionError::SecretKey(e.to_string()))?;

        let (version, secret) =
            decode_latest_secret(secrets).ok_or(WebSessionError::SecretDecode)?;
        let cached = CachedSecret {
            secret,
            version,
            fetched_at: Instant::now(),
        };
        *self.cached_secret.write().await = Some(cached.clone());

        Ok(cached)
    }

    async fn server_time(&self) -> Result<u64, WebSessionError> {
        let response: ServerTimeResponse = self
            .client
            .get(SERVER_TIME_URL)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| WebSessionError::ServerTime(e.to_string()))?
            .json()
            .await
            .map_err(|e| WebSessionError::ServerTime(e.to_string()))?;

        Ok(response.server_time)
    }

    async fn exchange(
        &self,
        code: &str,
        version: &str,
        timestamp_ms: u64,
    ) -> Result<CachedToken, WebSessionError> {
        let url = format!(
            "{TOKEN_URL}?reason=init&productType=web-player&totp={code}&totpVer={version}&ts={timestamp_ms}"
        );

        let response = self
            .client
            .get(&url)
            .header("Cookie", format!("sp_dc={}", self.sp_dc))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Web-player token request failed: HTTP {}", status);
            return Err(WebSessionError::TokenFetch(format!("HTTP {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| WebSessionError::TokenFetch(e.to_string()))?;

        if token.is_anonymous {
            warn!("Received an anonymous token, sp_dc cookie is invalid or expired");
            return Err(WebSessionError::SpDcInvalid);
        }

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at_ms: token.access_token_expiration_timestamp_ms,
        })
    }
}

#[async_trait]
impl AccessTokenProvider for WebSessionTokens {
    async fn access_token(&self) -> Result<String, CoreError> {
        Ok(self.token().await?)
    }

    async fn invalidate(&self) {
        *self.cached_token.write().await = None;
        debug!("Invalidated cached web-player token");
    }
}
