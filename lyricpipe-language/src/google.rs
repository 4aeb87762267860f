//! Google Translate backend for translation and multi-script romanization.

use async_trait::async_trait;
use lyricpipe_core::{CoreError, RomanizationProvider, Romanizer, Translator};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const GOOGLE_TRANSLATE_API: &str = "https://translate.googleapis.com/translate_a/single";

/// Provider name used in errors
const PROVIDER: &str = "gcloud";

/// Default timeout for HTTP requests (5 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Google Translate client.
///
/// Serves as the `gcloud` romanization provider (via the transliteration
/// part of the response) and as the translation backend.
pub struct GoogleTranslateClient {
    client: ClientWithMiddleware,
}

impl GoogleTranslateClient {
    /// Create a new client with a 5-second request timeout and 2 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    async fn query(
        &self,
        text: &str,
        source: &str,
        target: &str,
        data: &str,
    ) -> Result<Value, CoreError> {
        let url = request_url(text, source, target, data);
        debug!("Google GET: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("API returned status {}", response.status())));
        }

        response.json().await.map_err(|e| unavailable(e.to_string()))
    }
}

fn unavailable(reason: String) -> CoreError {
    CoreError::TransformationUnavailable {
        provider: PROVIDER.to_string(),
        reason,
    }
}

/// Build the request URL. `data` selects the response parts: `t` for
/// translation, `rm` for transliteration.
fn request_url(text: &str, source: &str, target: &str, data: &str) -> String {
    let source = if source.is_empty() { "auto" } else { source };
    format!(
        "{GOOGLE_TRANSLATE_API}?client=gtx&sl={}&tl={}&dt={}&q={}",
        urlencoding::encode(source),
        urlencoding::encode(target),
        data,
        urlencoding::encode(text)
    )
}

/// Concatenate the translated segments of a response.
///
/// The first element is a list of segments; translated segments carry the
/// translation at index 0.
fn parse_translation(value: &Value) -> Option<String> {
    let translated: String = value
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|segment| segment.get(0)?.as_str())
        .collect();

    (!translated.is_empty()).then_some(translated)
}

/// Extract the source-text transliteration of a response.
///
/// The transliteration segment has no translation and carries the source
/// transliteration at index 3.
fn parse_romanization(value: &Value) -> Option<String> {
    value
        .get(0)?
        .as_array()?
        .iter()
        .find_map(|segment| segment.get(3)?.as_str())
        .map(str::to_string)
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn translate(&self, text: &str, target: &str) -> Result<String, CoreError> {
        let value = self.query(text, "auto", target, "t").await?;
        parse_translation(&value).ok_or_else(|| unavailable("response has no translation".into()))
    }
}

#[async_trait]
impl Romanizer for GoogleTranslateClient {
    fn provider(&self) -> RomanizationProvider {
        RomanizationProvider::GCloud
    }

    async fn romanize(&self, text: &str, language: &str) -> Result<String, CoreError> {
        // Transliteration is only returned alongside a translation into another language
        let target = if language.eq_ignore_ascii_case("en") { "ja" } else { "en" };
        let value = self.query(text, language, target, "rm").await?;

        // Latin-script input has no transliteration
        Ok(parse_romanization(&value).unwrap_or_else(|| text.to_string()))
    }
}
