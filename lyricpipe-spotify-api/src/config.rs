//! Spotify provider configuration.

use const_format::concatcp;
use lyricpipe_core::{CoreError, ProvidersConfig};
use serde::{Deserialize, Serialize};

/// Provider name used in config file
pub const PROVIDER_NAME: &str = "spotify";

/// Redirect URI registered for the app in the Spotify developer dashboard
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Default URL of the TOTP secret dictionary used for web-player tokens
pub const DEFAULT_SECRET_KEY_URL: &str =
    "https://raw.githubusercontent.com/xyloflake/spot-secrets-go/refs/heads/main/secrets/secretDict.json";

/// Spotify-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyProviderConfig {
    /// Spotify OAuth client ID
    #[serde(default)]
    pub client_id: String,
    /// Spotify OAuth client secret
    #[serde(default)]
    pub client_secret: String,
    /// OAuth redirect URI
    #[serde(default = "default_redirect_uri")]
    pub oauth_redirect_uri: String,
    /// `sp_dc` cookie of a logged-in open.spotify.com session, used for lyrics
    #[serde(default)]
    pub sp_dc: String,
    /// Override for the TOTP secret dictionary URL
    #[serde(default)]
    pub secret_key_url: Option<String>,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.into()
}

impl SpotifyProviderConfig {
    /// Extract Spotify config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_NAME)
    }

    /// Validate that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, value) in [
            ("providers.spotify.client_id", &self.client_id),
            ("providers.spotify.client_secret", &self.client_secret),
            ("providers.spotify.oauth_redirect_uri", &self.oauth_redirect_uri),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::ConfigMissingField {
                    field: field.into(),
                });
            }
        }
        Ok(())
    }

    /// The `sp_dc` cookie required by the lyrics endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigMissingField`] if the cookie is not set.
    pub fn sp_dc(&self) -> Result<&str, CoreError> {
        let sp_dc = self.sp_dc.trim();
        if sp_dc.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.spotify.sp_dc".into(),
            });
        }
        Ok(sp_dc)
    }

    /// The configured secret dictionary URL, or the default one.
    #[must_use]
    pub fn secret_key_url(&self) -> &str {
        self.secret_key_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_SECRET_KEY_URL)
    }
}

/// Config template for the Spotify provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"[providers.spotify]
# Get these from https://developer.spotify.com/dashboard
client_id = ""
client_secret = ""
oauth_redirect_uri = ""#,
    DEFAULT_REDIRECT_URI,
    r#""
# Lyrics come from an unofficial web-player API (use at your own risk, may violate TOS).
# Copy the sp_dc cookie from a logged-in browser session on open.spotify.com
sp_dc = ""
# Optional: URL for fetching TOTP secret keys
# secret_key_url = ""#,
    DEFAULT_SECRET_KEY_URL,
    "\"\n"
);

#[cfg(test)]
mod tests {
    use super::*;
    use lyricpipe_core::LyricpipeConfig;

    #[test]
    fn test_template_section() {
        let config: LyricpipeConfig = toml::from_str(CONFIG_TEMPLATE).unwrap();
        let spotify = SpotifyProviderConfig::from_providers(&config.providers)
            .unwrap()
            .unwrap();

        assert_eq!(spotify.oauth_redirect_uri, DEFAULT_REDIRECT_URI);
        assert!(matches!(
            spotify.validate(),
            Err(CoreError::ConfigMissingField { field }) if field == "providers.spotify.client_id"
        ));
    }

    #[test]
    fn test_valid_section() {
        let config: LyricpipeConfig = toml::from_str(
            r#"
            [providers.spotify]
            client_id = "id"
            client_secret = "secret"
            "#,
        )
        .unwrap();
        let spotify = SpotifyProviderConfig::from_providers(&config.providers)
            .unwrap()
            .unwrap();

        assert!(spotify.validate().is_ok());
        assert_eq!(spotify.oauth_redirect_uri, DEFAULT_REDIRECT_URI);
        assert!(matches!(
            spotify.sp_dc(),
            Err(CoreError::ConfigMissingField { field }) if field == "providers.spotify.sp_dc"
        ));
        assert_eq!(spotify.secret_key_url(), DEFAULT_SECRET_KEY_URL);
    }

    #[test]
    fn test_web_session_fields() {
        let config: LyricpipeConfig = toml::from_str(
            r#"
            [providers.spotify]
            client_id = "id"
            client_secret = "secret"
            sp_dc = " AQB-cookie "
            secret_key_url = "https://example.com/secrets.json"
            "#,
        )
        .unwrap();
        let spotify = SpotifyProviderConfig::from_providers(&config.providers)
            .unwrap()
            .unwrap();

        assert_eq!(spotify.sp_dc().unwrap(), "AQB-cookie");
        assert_eq!(spotify.secret_key_url(), "https://example.com/secrets.json");
    }

    #[test]
    fn test_missing_section() {
        let config = LyricpipeConfig::default();
        assert_eq!(SpotifyProviderConfig::from_providers(&config.providers).unwrap(), None);
    }
}
