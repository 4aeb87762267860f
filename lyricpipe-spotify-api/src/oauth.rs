use crate::config::SpotifyProviderConfig;
use crate::error::{http_status, Result, SpotifyError};
use async_trait::async_trait;
use lyricpipe_core::{AccessTokenProvider, CoreError};
use rspotify::{prelude::*, scopes, AuthCodeSpotify, Credentials, OAuth, Token};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Refresh token proactively if it expires within this many seconds
const PROACTIVE_REFRESH_THRESHOLD_SECS: i64 = 60;

/// Persisted token data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>, // Unix timestamp
    scopes: Vec<String>,
}

impl From<&Token> for PersistedToken {
    fn from(token: &Token) -> Self {
        let mut scopes: Vec<String> = token.scopes.iter().cloned().collect();
        scopes.sort();
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at.map(|d| d.timestamp()),
            scopes,
        }
    }
}

impl From<PersistedToken> for Token {
    fn from(persisted: PersistedToken) -> Self {
        Self {
            access_token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            expires_at: persisted
                .expires_at
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            expires_in: chrono::TimeDelta::zero(),
            scopes: persisted.scopes.into_iter().collect(),
        }
    }
}

/// Authorized Spotify session shared by the playback poller and the lyrics adapter.
///
/// Tokens are cached at ~/.config/lyricpipe/.spotify_token_cache.json and
/// refreshed shortly before they expire.
pub struct SpotifyOAuth {
    client: AuthCodeSpotify,
    token_path: PathBuf,
}

impl SpotifyOAuth {
    /// Create a new session using the default token cache path
    #[must_use]
    pub fn new(config: &SpotifyProviderConfig) -> Self {
        Self::with_token_path(config, crate::paths::spotify_token_cache_path())
    }

    /// Create a new session with an explicit token cache path
    #[must_use]
    pub fn with_token_path(config: &SpotifyProviderConfig, token_path: PathBuf) -> Self {
        let creds = Credentials::new(&config.client_id, &config.client_secret);

        let oauth = OAuth {
            redirect_uri: config.oauth_redirect_uri.clone(),
            scopes: scopes!("user-read-currently-playing", "user-read-playback-state"),
            ..Default::default()
        };

        Self {
            client: AuthCodeSpotify::new(creds, oauth),
            token_path,
        }
    }

    #[must_use]
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Acquire lock on token.
    async fn lock_token(&self) -> Result<futures::lock::MutexGuard<'_, Option<Token>>> {
        self.client
            .token
            .lock()
            .await
            .map_err(|_| SpotifyError::AuthFailed {
                reason: "Failed to acquire token lock".to_string(),
            })
    }

    /// Try to load the cached token, refreshing it if it already expired.
    ///
    /// Returns `false` when there is no usable cached token and `lyricpipe login`
    /// has to be run.
    ///
    /// # Errors
    ///
    /// Returns an error if the token file cannot be read or parsed, or the token
    /// cannot be refreshed.
    pub async fn load_cached_token(&self) -> Result<bool> {
        if !self.token_path.exists() {
            info!("No cached token file found at {:?}", self.token_path);
            return Ok(false);
        }

        let content = fs::read_to_string(&self.token_path)?;
        let persisted: PersistedToken = serde_json::from_str(&content)?;
        let token = Token::from(persisted);

        if token.is_expired() {
            if token.refresh_token.is_some() {
                info!("Cached token is expired but has refresh token, attempting refresh...");
                *self.lock_token().await? = Some(token);
                return self.refresh_token().await.map(|()| true);
            }
            info!("Cached token is expired and has no refresh token, re-authentication required");
            return Ok(false);
        }

        *self.lock_token().await? = Some(token);
        info!("Loaded valid cached Spotify token");
        Ok(true)
    }

    /// Save current token to file
    async fn save_token(&self) -> Result<()> {
        let token_guard = self.lock_token().await?;
        if let Some(ref token) = *token_guard {
            let persisted = PersistedToken::from(token);

            if let Some(parent) = self.token_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let content = serde_json::to_string_pretty(&persisted)?;
            fs::write(&self.token_path, content)?;
            debug!("Saved Spotify token to {:?}", self.token_path);
        }
        Ok(())
    }

    /// Refresh the access token.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::TokenExpired`] if Spotify rejects the refresh token,
    /// or [`SpotifyError::Api`] if the refresh request could not be completed.
    pub async fn refresh_token(&self) -> Result<()> {
        info!("Refreshing Spotify access token");

        if let Err(e) = self.client.refresh_token().await {
            return Err(match http_status(&e) {
                Some(400 | 401) => SpotifyError::TokenExpired {
                    reason: format!("refresh token rejected ({e}), run `lyricpipe login` again"),
                },
                _ => SpotifyError::Api(e),
            });
        }

        self.save_token().await
    }

    /// Proactively refresh the token if it will expire soon (within 60 seconds).
    ///
    /// # Errors
    ///
    /// Returns an error if there is no token or the refresh fails.
    pub async fn ensure_token_fresh(&self) -> Result<()> {
        let needs_refresh = {
            let token_guard = self.lock_token().await?;
            let Some(token) = token_guard.as_ref() else {
                return Err(SpotifyError::TokenExpired {
                    reason: "not logged in, run `lyricpipe login`".into(),
                });
            };
            check_needs_refresh(token, chrono::Utc::now())
        };

        if needs_refresh {
            self.refresh_token().await?;
        }

        Ok(())
    }

    /// Get the authorization URL for the user to visit
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization URL cannot be generated.
    pub fn get_authorize_url(&self) -> Result<String> {
        self.client
            .get_authorize_url(false)
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("Failed to generate auth URL: {e}"),
            })
    }

    /// Exchange the code in the URL Spotify redirected to for a token and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL carries no code, or the token exchange or save fails.
    pub async fn complete_authorization(&self, redirected_url: &str) -> Result<()> {
        let code = self
            .client
            .parse_response_code(redirected_url.trim())
            .ok_or_else(|| SpotifyError::AuthFailed {
                reason: "No authorization code found in the redirected URL".into(),
            })?;

        self.client
            .request_token(&code)
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("Token exchange failed: {e}"),
            })?;

        self.save_token().await?;
        info!("Successfully authenticated with Spotify");
        Ok(())
    }

    /// Get the underlying Spotify client
    #[must_use]
    pub const fn client(&self) -> &AuthCodeSpotify {
        &self.client
    }
}

#[async_trait]
impl AccessTokenProvider for SpotifyOAuth {
    async fn access_token(&self) -> std::result::Result<String, CoreError> {
        self.ensure_token_fresh().await?;

        let token_guard = self.lock_token().await?;
        token_guard
            .as_ref()
            .map(|token| token.access_token.clone())
            .ok_or_else(|| CoreError::FatalAuthExpired {
                reason: "not logged in, run `lyricpipe login`".into(),
            })
    }
}

/// Check if token needs refresh (expires within threshold).
fn check_needs_refresh(token: &Token, now: chrono::DateTime<chrono::Utc>) -> bool {
    let Some(expires_at) = token.expires_at else {
        // No expiration time, assume it's fine
        return false;
    };

    let seconds_until_expiry = (expires_at - now).num_seconds();

    if seconds_until_expiry <= PROACTIVE_REFRESH_THRESHOLD_SECS {
        debug!(
            "Token expires in {}s (threshold: {}s), refreshing proactively",
            seconds_until_expiry, PROACTIVE_REFRESH_THRESHOLD_SECS
        );
        true
    } else {
        false
    }
}
