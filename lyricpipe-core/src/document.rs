//! Normalized lyric documents as handed to the synchronizer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing granularity of a lyric document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    /// Plain text lines without timing
    Unsynced,
    /// Each line carries a start offset
    LineSynced,
}

/// Provider metadata attached to a lyric document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Provider identifier (e.g. "MusixMatch")
    pub provider: String,
    /// Provider-specific lyrics ID
    pub provider_lyrics_id: String,
    /// Human-readable provider name
    pub provider_display_name: String,
    /// ISO-639 language code of the lyrics
    pub language: String,
    /// URI of the synced lyrics at the provider
    pub sync_lyrics_uri: String,
    /// Whether the lyrics are written right-to-left
    pub is_rtl_language: bool,
    /// Whether the lyrics use a dense typeface (CJK and similar)
    pub is_dense_typeface: bool,
    /// Alternative lyric variants, passed through untouched
    pub alternatives: Vec<serde_json::Value>,
    /// Display hint for fullscreen players
    pub fullscreen_action: Option<String>,
}

/// Transformation output cached on a line, keyed by provider or target language
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CachedText {
    pub(crate) key: String,
    pub(crate) text: String,
}

/// A single lyric line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    text: String,
    start_time: Option<Duration>,
    romanized: Option<CachedText>,
    translated: Option<CachedText>,
}

impl LyricLine {
    /// Create a line that starts at the given offset
    pub fn synced(start_time: Duration, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_time: Some(start_time),
            romanized: None,
            translated: None,
        }
    }

    /// Create a line without timing
    pub fn unsynced(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_time: None,
            romanized: None,
            translated: None,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Start offset, only present in line-synced documents
    #[must_use]
    pub const fn start_time(&self) -> Option<Duration> {
        self.start_time
    }

    /// Cached romanization produced by `provider`, if any
    #[must_use]
    pub fn romanized(&self, provider: &str) -> Option<&str> {
        lookup(self.romanized.as_ref(), provider)
    }

    /// Cached translation into `language`, if any
    #[must_use]
    pub fn translated(&self, language: &str) -> Option<&str> {
        lookup(self.translated.as_ref(), language)
    }

    pub(crate) fn cache_romanized(&mut self, provider: &str, text: String) {
        self.romanized = Some(CachedText {
            key: provider.to_string(),
            text,
        });
    }

    pub(crate) fn cache_translated(&mut self, language: &str, text: String) {
        self.translated = Some(CachedText {
            key: language.to_string(),
            text,
        });
    }
}

fn lookup<'a>(cached: Option<&'a CachedText>, key: &str) -> Option<&'a str> {
    cached
        .filter(|cached| cached.key == key)
        .map(|cached| cached.text.as_str())
}

/// Lyrics for one track, immutable apart from per-line transformation caches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricDocument {
    sync_type: SyncType,
    lines: Vec<LyricLine>,
    metadata: DocumentMetadata,
}

impl LyricDocument {
    /// Build a document, normalizing line order for the given sync type.
    ///
    /// Synced lines are stably sorted by start offset so that lines sharing an
    /// offset keep their document order. Unsynced documents drop any offsets.
    #[must_use]
    pub fn new(sync_type: SyncType, mut lines: Vec<LyricLine>, metadata: DocumentMetadata) -> Self {
        match sync_type {
            SyncType::LineSynced => {
                for line in &mut lines {
                    if line.start_time.is_none() {
                        line.start_time = Some(Duration::ZERO);
                    }
                }
                lines.sort_by_key(|line| line.start_time);
            }
            SyncType::Unsynced => {
                for line in &mut lines {
                    line.start_time = None;
                }
            }
        }

        Self {
            sync_type,
            lines,
            metadata,
        }
    }

    #[must_use]
    pub const fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    #[must_use]
    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.metadata.language
    }

    pub(crate) fn line_mut(&mut self, index: usize) -> Option<&mut LyricLine> {
        self.lines.get_mut(index)
    }

    /// Index of the line active at `position`: the last line whose start offset
    /// is not after it. `None` for unsynced documents or before the first line.
    #[must_use]
    pub fn current_line_index(&self, position: Duration) -> Option<usize> {
        if self.sync_type == SyncType::Unsynced {
            return None;
        }

        self.lines
            .iter()
            .enumerate()
            .rev()
            .find(|(_, line)| line.start_time.is_some_and(|start| start <= position))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(lines: &[(u64, &str)]) -> LyricDocument {
        LyricDocument::new(
            SyncType::LineSynced,
            lines
                .iter()
                .map(|(ms, text)| LyricLine::synced(Duration::from_millis(*ms), *text))
                .collect(),
            DocumentMetadata::default(),
        )
    }

    #[test]
    fn test_current_line_index() {
        let doc = synced(&[(0, "a"), (1000, "b"), (2000, "c")]);

        assert_eq!(doc.current_line_index(Duration::from_millis(500)), Some(0));
        assert_eq!(doc.current_line_index(Duration::from_millis(1000)), Some(1));
        assert_eq!(doc.current_line_index(Duration::from_millis(1999)), Some(1));
        assert_eq!(doc.current_line_index(Duration::from_secs(60)), Some(2));
    }

    #[test]
    fn test_before_first_line() {
        let doc = synced(&[(1500, "first"), (3000, "second")]);

        assert_eq!(doc.current_line_index(Duration::ZERO), None);
        assert_eq!(doc.current_line_index(Duration::from_millis(1499)), None);
        assert_eq!(doc.current_line_index(Duration::from_millis(1500)), Some(0));
    }

    #[test]
    fn test_shared_offset_later_line_wins() {
        let doc = synced(&[(0, "a"), (1000, "b1"), (1000, "b2"), (2000, "c")]);

        let index = doc.current_line_index(Duration::from_millis(1200));
        assert_eq!(index, Some(2));
        assert_eq!(doc.lines()[2].text(), "b2");
    }

    #[test]
    fn test_synced_lines_are_sorted() {
        let doc = synced(&[(2000, "c"), (0, "a"), (1000, "b")]);

        let texts: Vec<_> = doc.lines().iter().map(LyricLine::text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsynced_ignores_position() {
        let doc = LyricDocument::new(
            SyncType::Unsynced,
            vec![
                LyricLine::synced(Duration::from_millis(10), "a"),
                LyricLine::unsynced("b"),
            ],
            DocumentMetadata::default(),
        );

        assert!(doc.lines().iter().all(|l| l.start_time().is_none()));
        for ms in [0, 500, 10_000, 600_000] {
            assert_eq!(doc.current_line_index(Duration::from_millis(ms)), None);
        }
    }

    #[test]
    fn test_cache_is_keyed() {
        let mut line = LyricLine::unsynced("こんにちは");
        line.cache_romanized("kuroshiro", "konnichiha".into());
        line.cache_translated("es", "hola".into());

        assert_eq!(line.romanized("kuroshiro"), Some("konnichiha"));
        assert_eq!(line.romanized("gcloud"), None);
        assert_eq!(line.translated("es"), Some("hola"));
        assert_eq!(line.translated("en"), None);
        assert_eq!(line.text(), "こんにちは");
    }
}
