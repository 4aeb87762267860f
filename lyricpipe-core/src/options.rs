//! Immutable pipeline options, built once per run from config and CLI overrides.

use crate::config::{DriftTuning, PipeConfig, TimeoutConfig};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Romanization backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RomanizationProvider {
    /// Local Japanese kana/kanji romanization
    #[default]
    Kuroshiro,
    /// Google Cloud translation romanization (supports many scripts)
    #[serde(rename = "gcloud")]
    GCloud,
}

impl RomanizationProvider {
    /// Stable identifier, also used as the per-line cache key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kuroshiro => "kuroshiro",
            Self::GCloud => "gcloud",
        }
    }
}

/// Drift-tolerance strategy applied between polls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Trust every poll literally; only re-evaluate at poll boundaries
    #[default]
    None,
    /// Extrapolate between polls, resync only on large contradictions
    Autoplay,
    /// Extrapolate between polls with a tight resync threshold
    Balance,
}

impl SyncStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Autoplay => "autoplay",
            Self::Balance => "balance",
        }
    }
}

/// Horizontal alignment of emitted rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl HorizontalAlign {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

macro_rules! impl_choice {
    ($ty:ty, $option:literal, [$($variant:expr),+]) => {
        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| CoreError::ConfigInvalid {
                        message: format!(
                            "<{}> should be one of the following options: {}",
                            $option,
                            [$($variant.as_str()),+].join(", ")
                        ),
                    })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_choice!(
    RomanizationProvider,
    "romanization-provider",
    [RomanizationProvider::Kuroshiro, RomanizationProvider::GCloud]
);
impl_choice!(
    SyncStrategy,
    "sync-type",
    [SyncStrategy::None, SyncStrategy::Autoplay, SyncStrategy::Balance]
);
impl_choice!(
    HorizontalAlign,
    "horizontal-align",
    [HorizontalAlign::Left, HorizontalAlign::Center, HorizontalAlign::Right]
);

/// Timeouts for calls to external services, distinct from the poll delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub playback: Duration,
    pub lyrics: Duration,
    pub transform: Duration,
}

/// Configuration snapshot consumed by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub romanize: bool,
    pub romanization_provider: RomanizationProvider,
    /// Poll interval and floor between outbound playback/lyrics requests
    pub delay: Duration,
    /// Target language code, `None` when translation is disabled
    pub translate_to: Option<String>,
    pub sync_type: SyncStrategy,
    pub horizontal_align: HorizontalAlign,
    /// Blank rows emitted after every line
    pub vertical_spacing: usize,
    /// Output width used for center/right alignment
    pub line_width: usize,
    pub drift: DriftTuning,
    pub timeouts: Timeouts,
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            playback: Duration::from_millis(config.playback_ms),
            lyrics: Duration::from_millis(config.lyrics_ms),
            transform: Duration::from_millis(config.transform_ms),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let pipe = PipeConfig::default();
        Self {
            romanize: pipe.romanize,
            romanization_provider: pipe.romanization_provider,
            delay: Duration::from_millis(pipe.delay_ms),
            translate_to: None,
            sync_type: pipe.sync_type,
            horizontal_align: pipe.horizontal_align,
            vertical_spacing: pipe.vertical_spacing,
            line_width: pipe.line_width,
            drift: DriftTuning::default(),
            timeouts: Timeouts::from(&TimeoutConfig::default()),
        }
    }
}

impl PipelineOptions {
    /// Validate config sections and build the options snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] if the delay, a timeout or a drift tick is zero,
    /// or the translation target is not a language code.
    pub fn from_config(
        pipe: &PipeConfig,
        drift: &DriftTuning,
        timeouts: &TimeoutConfig,
    ) -> Result<Self> {
        if pipe.delay_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "<delay> should be a valid positive number".into(),
            });
        }

        for (name, value) in [
            ("timeouts.playback_ms", timeouts.playback_ms),
            ("timeouts.lyrics_ms", timeouts.lyrics_ms),
            ("timeouts.transform_ms", timeouts.transform_ms),
            ("sync.autoplay_tick_ms", drift.autoplay_tick_ms),
            ("sync.balance_tick_ms", drift.balance_tick_ms),
        ] {
            if value == 0 {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{name} should be a valid positive number"),
                });
            }
        }

        Ok(Self {
            romanize: pipe.romanize,
            romanization_provider: pipe.romanization_provider,
            delay: Duration::from_millis(pipe.delay_ms),
            translate_to: parse_translate_to(pipe.translate_to.as_deref())?,
            sync_type: pipe.sync_type,
            horizontal_align: pipe.horizontal_align,
            vertical_spacing: pipe.vertical_spacing,
            line_width: pipe.line_width,
            drift: drift.clone(),
            timeouts: Timeouts::from(timeouts),
        })
    }
}

/// Normalize the translation target. Empty, "false" and "disabled" turn translation off.
fn parse_translate_to(value: Option<&str>) -> Result<Option<String>> {
    let Some(value) = value.map(str::trim) else {
        return Ok(None);
    };

    if value.is_empty()
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("disabled")
    {
        return Ok(None);
    }

    // ISO-639 code with optional region or script subtag, e.g. "es", "zh-TW", "mni-Mtei"
    let valid = value.split('-').enumerate().all(|(i, part)| {
        let len_ok = if i == 0 {
            (2..=3).contains(&part.len())
        } else {
            (2..=4).contains(&part.len())
        };
        len_ok && part.chars().all(|c| c.is_ascii_alphanumeric())
    });

    if valid {
        Ok(Some(value.to_string()))
    } else {
        Err(CoreError::ConfigInvalid {
            message: format!("<translate-to> should be an ISO-639 language code, got \"{value}\""),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PipelineOptions::default();

        assert!(!options.romanize);
        assert_eq!(options.romanization_provider, RomanizationProvider::Kuroshiro);
        assert_eq!(options.delay, Duration::from_millis(2000));
        assert_eq!(options.translate_to, None);
        assert_eq!(options.sync_type, SyncStrategy::None);
        assert_eq!(options.horizontal_align, HorizontalAlign::Left);
        assert_eq!(options.vertical_spacing, 0);
    }

    #[test]
    fn test_zero_delay_rejected() {
        let pipe = PipeConfig {
            delay_ms: 0,
            ..PipeConfig::default()
        };
        let err =
            PipelineOptions::from_config(&pipe, &DriftTuning::default(), &TimeoutConfig::default());
        assert!(matches!(err, Err(CoreError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_translate_to_parsing() {
        assert_eq!(parse_translate_to(None).ok(), Some(None));
        assert_eq!(parse_translate_to(Some("")).ok(), Some(None));
        assert_eq!(parse_translate_to(Some("false")).ok(), Some(None));
        assert_eq!(parse_translate_to(Some("es")).ok(), Some(Some("es".to_string())));
        assert_eq!(parse_translate_to(Some(" zh-TW ")).ok(), Some(Some("zh-TW".to_string())));
        assert!(parse_translate_to(Some("spanish!")).is_err());
        assert!(parse_translate_to(Some("e")).is_err());
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!(
            "gcloud".parse::<RomanizationProvider>().ok(),
            Some(RomanizationProvider::GCloud)
        );
        assert_eq!("Balance".parse::<SyncStrategy>().ok(), Some(SyncStrategy::Balance));
        assert_eq!("center".parse::<HorizontalAlign>().ok(), Some(HorizontalAlign::Center));

        let err = "middle".parse::<HorizontalAlign>().err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Invalid config: <horizontal-align> should be one of the following options: left, center, right")
        );
    }
}
