use crate::error::{CoreError, Result};
use crate::options::{HorizontalAlign, RomanizationProvider, SyncStrategy};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure (~/.config/lyricpipe/config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyricpipeConfig {
    #[serde(default)]
    pub pipe: PipeConfig,
    #[serde(default)]
    pub sync: DriftTuning,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Provider-specific sections, e.g. `[providers.spotify]`
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Defaults for the `pipe` command; CLI flags override these
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeConfig {
    #[serde(default)]
    pub romanize: bool,
    #[serde(default)]
    pub romanization_provider: RomanizationProvider,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// ISO-639 code, or empty to disable translation
    #[serde(default)]
    pub translate_to: Option<String>,
    #[serde(default)]
    pub sync_type: SyncStrategy,
    #[serde(default)]
    pub horizontal_align: HorizontalAlign,
    #[serde(default)]
    pub vertical_spacing: usize,
    #[serde(default = "default_line_width")]
    pub line_width: usize,
}

const fn default_delay_ms() -> u64 {
    2000
}

const fn default_line_width() -> usize {
    80
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            romanize: false,
            romanization_provider: RomanizationProvider::default(),
            delay_ms: default_delay_ms(),
            translate_to: None,
            sync_type: SyncStrategy::default(),
            horizontal_align: HorizontalAlign::default(),
            vertical_spacing: 0,
            line_width: default_line_width(),
        }
    }
}

/// Drift-tolerance constants for the extrapolating sync strategies.
///
/// A poll whose offset differs from the extrapolated offset by more than the
/// resync threshold resets the extrapolation baseline. The tick is how often the
/// current line is re-evaluated between polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftTuning {
    #[serde(default = "default_autoplay_resync_threshold_ms")]
    pub autoplay_resync_threshold_ms: u64,
    #[serde(default = "default_balance_resync_threshold_ms")]
    pub balance_resync_threshold_ms: u64,
    #[serde(default = "default_autoplay_tick_ms")]
    pub autoplay_tick_ms: u64,
    #[serde(default = "default_balance_tick_ms")]
    pub balance_tick_ms: u64,
}

pub const DEFAULT_AUTOPLAY_RESYNC_THRESHOLD_MS: u64 = 3000;
pub const DEFAULT_BALANCE_RESYNC_THRESHOLD_MS: u64 = 750;
pub const DEFAULT_AUTOPLAY_TICK_MS: u64 = 250;
pub const DEFAULT_BALANCE_TICK_MS: u64 = 100;

const fn default_autoplay_resync_threshold_ms() -> u64 {
    DEFAULT_AUTOPLAY_RESYNC_THRESHOLD_MS
}

const fn default_balance_resync_threshold_ms() -> u64 {
    DEFAULT_BALANCE_RESYNC_THRESHOLD_MS
}

const fn default_autoplay_tick_ms() -> u64 {
    DEFAULT_AUTOPLAY_TICK_MS
}

const fn default_balance_tick_ms() -> u64 {
    DEFAULT_BALANCE_TICK_MS
}

impl Default for DriftTuning {
    fn default() -> Self {
        Self {
            autoplay_resync_threshold_ms: DEFAULT_AUTOPLAY_RESYNC_THRESHOLD_MS,
            balance_resync_threshold_ms: DEFAULT_BALANCE_RESYNC_THRESHOLD_MS,
            autoplay_tick_ms: DEFAULT_AUTOPLAY_TICK_MS,
            balance_tick_ms: DEFAULT_BALANCE_TICK_MS,
        }
    }
}

/// Per-call timeouts for external services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_playback_timeout_ms")]
    pub playback_ms: u64,
    #[serde(default = "default_lyrics_timeout_ms")]
    pub lyrics_ms: u64,
    #[serde(default = "default_transform_timeout_ms")]
    pub transform_ms: u64,
}

const fn default_playback_timeout_ms() -> u64 {
    5000
}

const fn default_lyrics_timeout_ms() -> u64 {
    10_000
}

const fn default_transform_timeout_ms() -> u64 {
    5000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            playback_ms: default_playback_timeout_ms(),
            lyrics_ms: default_lyrics_timeout_ms(),
            transform_ms: default_transform_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to ~/.config/lyricpipe/lyricpipe.log
    #[serde(default)]
    pub file: bool,
}

/// Raw provider sections, deserialized on demand by the crate that owns them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidersConfig(toml::Table);

impl ProvidersConfig {
    /// Deserialize the `[providers.<name>]` section, if present.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] if the section does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.0
            .get(name)
            .map(|value| {
                value.clone().try_into().map_err(|e: toml::de::Error| CoreError::ConfigInvalid {
                    message: format!("providers.{name}: {e}"),
                })
            })
            .transpose()
    }
}

impl LyricpipeConfig {
    /// Get the config file path (~/.config/lyricpipe/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default path or create a template on first run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an error
    /// if the file cannot be read or parsed.
    pub fn load_or_create(provider_templates: Option<&[&str]>) -> Result<Self> {
        Self::load_or_create_at(&Self::config_path(), provider_templates)
    }

    /// Same as [`Self::load_or_create`] for an explicit path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an error
    /// if the file cannot be read or parsed.
    pub fn load_or_create_at(path: &Path, provider_templates: Option<&[&str]>) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(path, build_config_template(provider_templates))?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Build the first-run config file from the core template plus provider sections
#[must_use]
pub fn build_config_template(provider_templates: Option<&[&str]>) -> String {
    let mut template = String::from(CONFIG_TEMPLATE);
    for provider in provider_templates.unwrap_or_default() {
        template.push('\n');
        template.push_str(provider);
    }
    template
}

const CONFIG_TEMPLATE: &str = r#"# lyricpipe configuration
# ~/.config/lyricpipe/config.toml

[pipe]
# Add romanized sentences below lines that can be romanized
romanize = false
# "kuroshiro" (local, Japanese only) or "gcloud" (Google, many scripts)
romanization_provider = "kuroshiro"
# Delay (ms) between requests to the Spotify API
delay_ms = 2000
# ISO-639 code to translate into, or "" to disable
translate_to = ""
# "none", "autoplay" or "balance"
sync_type = "none"
# "left", "center" or "right"
horizontal_align = "left"
# Blank lines after each emitted line
vertical_spacing = 0
# Width used for center/right alignment
line_width = 80

[sync]
# Extrapolation tuning for sync_type = "autoplay" / "balance"
autoplay_resync_threshold_ms = 3000
balance_resync_threshold_ms = 750
autoplay_tick_ms = 250
balance_tick_ms = 100

[timeouts]
playback_ms = 5000
lyrics_ms = 10000
transform_ms = 5000

[logging]
file = false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct DummyProvider {
        client_id: String,
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config: LyricpipeConfig = toml::from_str(CONFIG_TEMPLATE).unwrap();

        assert_eq!(config.pipe.translate_to.as_deref(), Some(""));
        assert_eq!(config.pipe.delay_ms, 2000);
        assert_eq!(config.sync, DriftTuning::default());
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert!(!config.logging.file);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: LyricpipeConfig = toml::from_str("").unwrap();

        assert_eq!(config.pipe, PipeConfig::default());
        assert_eq!(config.sync.balance_resync_threshold_ms, 750);
    }

    #[test]
    fn test_enum_values() {
        let config: LyricpipeConfig = toml::from_str(
            r#"
            [pipe]
            romanization_provider = "gcloud"
            sync_type = "balance"
            horizontal_align = "right"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipe.romanization_provider, RomanizationProvider::GCloud);
        assert_eq!(config.pipe.sync_type, SyncStrategy::Balance);
        assert_eq!(config.pipe.horizontal_align, HorizontalAlign::Right);
    }

    #[test]
    fn test_provider_section() {
        let config: LyricpipeConfig = toml::from_str(
            r#"
            [providers.dummy]
            client_id = "abc"
            "#,
        )
        .unwrap();

        let dummy: Option<DummyProvider> = config.providers.get("dummy").unwrap();
        assert_eq!(
            dummy,
            Some(DummyProvider {
                client_id: "abc".into()
            })
        );
        assert!(config.providers.get::<DummyProvider>("missing").unwrap().is_none());
    }

    #[test]
    fn test_first_run_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let templates: &[&str] = &["[providers.dummy]\nclient_id = \"\"\n"];
        let result = LyricpipeConfig::load_or_create_at(&path, Some(templates));
        assert!(matches!(result, Err(CoreError::ConfigNotFound { .. })));

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# lyricpipe configuration"));
        assert!(written.contains("[providers.dummy]"));

        let config = LyricpipeConfig::load_or_create_at(&path, None).unwrap();
        assert_eq!(config.pipe.delay_ms, 2000);
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pipe\nromanize = ").unwrap();

        let result = LyricpipeConfig::load_or_create_at(&path, None);
        assert!(matches!(result, Err(CoreError::ConfigParseError(_))));
    }
}
