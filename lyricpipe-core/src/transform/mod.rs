//! Text transformations applied to lyric lines before emission.

pub mod layout;

use crate::document::LyricDocument;
use crate::error::{CoreError, Result};
use crate::options::{HorizontalAlign, PipelineOptions, RomanizationProvider};
use crate::time::DurationExt;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Converts text in a non-Latin script to Latin characters.
#[async_trait]
pub trait Romanizer: Send + Sync {
    /// Provider identity, also the key under which results are cached
    fn provider(&self) -> RomanizationProvider;

    /// Romanize `text` written in `language`.
    ///
    /// Text the provider cannot romanize is returned unchanged. Fails with
    /// `TransformationUnavailable` when the backend cannot be used.
    async fn romanize(&self, text: &str, language: &str) -> Result<String>;
}

/// Translates text into a target language.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &'static str;

    /// Translate `text` into the ISO-639 language `target`.
    async fn translate(&self, text: &str, target: &str) -> Result<String>;
}

/// Fixed-order composition of the enabled transformation stages:
/// romanization, translation, horizontal alignment, vertical spacing.
///
/// Disabled stages are identity. Results of the two network stages are cached
/// on the line so a line is transformed at most once per provider or target.
pub struct TransformPipeline {
    romanizer: Option<Box<dyn Romanizer>>,
    translator: Option<(Box<dyn Translator>, String)>,
    align: HorizontalAlign,
    line_width: usize,
    vertical_spacing: usize,
    timeout: Duration,
}

impl TransformPipeline {
    /// Build the pipeline, keeping only the stages enabled in `options`.
    #[must_use]
    pub fn new(
        options: &PipelineOptions,
        romanizer: Option<Box<dyn Romanizer>>,
        translator: Option<Box<dyn Translator>>,
    ) -> Self {
        let romanizer = romanizer.filter(|_| options.romanize);
        if let Some(romanizer) = &romanizer {
            if romanizer.provider() != options.romanization_provider {
                warn!(
                    "Romanizer provider {} does not match configured provider {}",
                    romanizer.provider(),
                    options.romanization_provider
                );
            }
        }

        let translator = translator.zip(options.translate_to.clone());

        Self {
            romanizer,
            translator,
            align: options.horizontal_align,
            line_width: options.line_width,
            vertical_spacing: options.vertical_spacing,
            timeout: options.timeouts.transform,
        }
    }

    /// Identity pipeline: no network stages, left alignment, no spacing
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            romanizer: None,
            translator: None,
            align: HorizontalAlign::Left,
            line_width: 0,
            vertical_spacing: 0,
            timeout: Duration::from_secs(5),
        }
    }

    /// Render the line at `index` into an output block, or `None` if there is no such line.
    pub async fn render_line(&self, document: &mut LyricDocument, index: usize) -> Option<String> {
        let rows = self.transform_line(document, index).await?;
        Some(layout::compose_block(
            &rows,
            self.align,
            self.line_width,
            self.vertical_spacing,
        ))
    }

    /// Render every line of the document, in order, into a single block.
    pub async fn render_document(&self, document: &mut LyricDocument) -> String {
        let mut blocks = Vec::with_capacity(document.lines().len());
        for index in 0..document.lines().len() {
            if let Some(block) = self.render_line(document, index).await {
                blocks.push(block);
            }
        }
        blocks.join("\n")
    }

    /// Output rows for one line: text, then romanization if it differs, then translation.
    async fn transform_line(
        &self,
        document: &mut LyricDocument,
        index: usize,
    ) -> Option<Vec<String>> {
        let language = document.language().to_string();
        let line = document.lines().get(index)?;
        let text = line.text().to_string();

        let mut rows = vec![text.clone()];

        if let Some(romanizer) = &self.romanizer {
            let key = romanizer.provider().as_str();
            let cached = line.romanized(key).map(str::to_string);
            let romanized = match cached {
                Some(romanized) => Some(romanized),
                None => {
                    let result = self
                        .with_timeout("romanize", romanizer.romanize(&text, &language))
                        .await;
                    match result {
                        Ok(romanized) => {
                            if let Some(line) = document.line_mut(index) {
                                line.cache_romanized(key, romanized.clone());
                            }
                            Some(romanized)
                        }
                        Err(e) => {
                            warn!("Romanization skipped for line {}: {}", index, e);
                            None
                        }
                    }
                }
            };

            if let Some(romanized) = romanized.filter(|r| !r.is_empty() && *r != text) {
                rows.push(romanized);
            }
        }

        if let Some((translator, target)) = &self.translator {
            let cached = document
                .lines()
                .get(index)
                .and_then(|line| line.translated(target))
                .map(str::to_string);
            let translated = match cached {
                Some(translated) => Some(translated),
                None => {
                    let result = self
                        .with_timeout("translate", translator.translate(&text, target))
                        .await;
                    match result {
                        Ok(translated) => {
                            if let Some(line) = document.line_mut(index) {
                                line.cache_translated(target, translated.clone());
                            }
                            Some(translated)
                        }
                        Err(e) => {
                            warn!(
                                "Translation via {} skipped for line {}: {}",
                                translator.name(),
                                index,
                                e
                            );
                            None
                        }
                    }
                }
            };

            if let Some(translated) = translated.filter(|t| !t.is_empty()) {
                rows.push(translated);
            }
        }

        Some(rows)
    }

    async fn with_timeout<F>(&self, operation: &'static str, future: F) -> Result<String>
    where
        F: Future<Output = Result<String>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    "{} exceeded {}ms",
                    operation,
                    self.timeout.as_millis_u64()
                );
                Err(CoreError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("romanizer", &self.romanizer.as_ref().map(|r| r.provider()))
            .field("translate_to", &self.translator.as_ref().map(|(_, target)| target))
            .field("align", &self.align)
            .field("line_width", &self.line_width)
            .field("vertical_spacing", &self.vertical_spacing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::document::{DocumentMetadata, LyricLine, SyncType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Uppercases input, fails when `fail` is set, counts calls
    pub(crate) struct StubRomanizer {
        pub(crate) calls: Arc<AtomicUsize>,
        pub(crate) fail: bool,
        pub(crate) stall: bool,
    }

    impl StubRomanizer {
        pub(crate) fn new() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    fail: false,
                    stall: false,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Romanizer for StubRomanizer {
        fn provider(&self) -> RomanizationProvider {
            RomanizationProvider::Kuroshiro
        }

        async fn romanize(&self, text: &str, _language: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(CoreError::TransformationUnavailable {
                    provider: "stub".into(),
                    reason: "down".into(),
                });
            }
            Ok(text.to_uppercase())
        }
    }

    /// Prefixes input with the target language, counts calls
    pub(crate) struct StubTranslator {
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl StubTranslator {
        pub(crate) fn new() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (Self { calls: calls.clone() }, calls)
        }
    }

    #[async_trait]
    impl Translator for StubTranslator {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn translate(&self, text: &str, target: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{target}] {text}"))
        }
    }

    fn document(lines: &[&str]) -> LyricDocument {
        LyricDocument::new(
            SyncType::Unsynced,
            lines.iter().map(|text| LyricLine::unsynced(*text)).collect(),
            DocumentMetadata {
                language: "ja".into(),
                ..DocumentMetadata::default()
            },
        )
    }

    fn options(romanize: bool, translate_to: Option<&str>) -> PipelineOptions {
        PipelineOptions {
            romanize,
            translate_to: translate_to.map(str::to_string),
            ..PipelineOptions::default()
        }
    }

    #[tokio::test]
    async fn test_all_stages_disabled_is_identity() {
        let pipeline = TransformPipeline::new(&options(false, None), None, None);
        let mut doc = document(&["hello world", "日本語の歌詞"]);

        assert_eq!(pipeline.render_line(&mut doc, 0).await.as_deref(), Some("hello world"));
        assert_eq!(pipeline.render_line(&mut doc, 1).await.as_deref(), Some("日本語の歌詞"));
        assert_eq!(pipeline.render_line(&mut doc, 2).await, None);
    }

    #[tokio::test]
    async fn test_disabled_stage_not_called() {
        let (romanizer, romanize_calls) = StubRomanizer::new();
        let (translator, translate_calls) = StubTranslator::new();
        let pipeline = TransformPipeline::new(
            &options(false, None),
            Some(Box::new(romanizer)),
            Some(Box::new(translator)),
        );
        let mut doc = document(&["abc"]);

        assert_eq!(pipeline.render_line(&mut doc, 0).await.as_deref(), Some("abc"));
        assert_eq!(romanize_calls.load(Ordering::SeqCst), 0);
        assert_eq!(translate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stage_order() {
        let (romanizer, _) = StubRomanizer::new();
        let (translator, _) = StubTranslator::new();
        let pipeline = TransformPipeline::new(
            &PipelineOptions {
                vertical_spacing: 1,
                ..options(true, Some("es"))
            },
            Some(Box::new(romanizer)),
            Some(Box::new(translator)),
        );
        let mut doc = document(&["abc"]);

        assert_eq!(
            pipeline.render_line(&mut doc, 0).await.as_deref(),
            Some("abc\nABC\n[es] abc\n")
        );
    }

    #[tokio::test]
    async fn test_transforms_cached_per_line() {
        let (romanizer, romanize_calls) = StubRomanizer::new();
        let (translator, translate_calls) = StubTranslator::new();
        let pipeline = TransformPipeline::new(
            &options(true, Some("en")),
            Some(Box::new(romanizer)),
            Some(Box::new(translator)),
        );
        let mut doc = document(&["abc", "def"]);

        for _ in 0..3 {
            pipeline.render_line(&mut doc, 0).await;
        }
        pipeline.render_line(&mut doc, 1).await;

        assert_eq!(romanize_calls.load(Ordering::SeqCst), 2);
        assert_eq!(translate_calls.load(Ordering::SeqCst), 2);
        assert_eq!(doc.lines()[0].romanized("kuroshiro"), Some("ABC"));
        assert_eq!(doc.lines()[0].translated("en"), Some("[en] abc"));
        assert_eq!(doc.lines()[0].text(), "abc");
    }

    #[tokio::test]
    async fn test_failure_passes_through_uncached() {
        let (mut romanizer, calls) = StubRomanizer::new();
        romanizer.fail = true;
        let pipeline =
            TransformPipeline::new(&options(true, None), Some(Box::new(romanizer)), None);
        let mut doc = document(&["かな"]);

        assert_eq!(pipeline.render_line(&mut doc, 0).await.as_deref(), Some("かな"));
        assert_eq!(pipeline.render_line(&mut doc, 0).await.as_deref(), Some("かな"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(doc.lines()[0].romanized("kuroshiro"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_stage_times_out() {
        let (mut romanizer, calls) = StubRomanizer::new();
        romanizer.stall = true;
        let pipeline =
            TransformPipeline::new(&options(true, None), Some(Box::new(romanizer)), None);
        let mut doc = document(&["かな"]);

        assert_eq!(pipeline.render_line(&mut doc, 0).await.as_deref(), Some("かな"));
        assert_eq!(doc.lines()[0].romanized("kuroshiro"), None);

        // Not cached: the next render asks the stage again
        assert_eq!(pipeline.render_line(&mut doc, 0).await.as_deref(), Some("かな"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(doc.lines()[0].romanized("kuroshiro"), None);
    }

    #[tokio::test]
    async fn test_unchanged_romanization_not_repeated() {
        let pipeline = TransformPipeline::new(
            &options(true, None),
            Some(Box::new(StubRomanizer::new().0)),
            None,
        );
        let mut doc = document(&["ABC"]);

        assert_eq!(pipeline.render_line(&mut doc, 0).await.as_deref(), Some("ABC"));
    }

    #[tokio::test]
    async fn test_render_document() {
        let pipeline = TransformPipeline::passthrough();
        let mut doc = document(&["one", "two", "three"]);

        assert_eq!(pipeline.render_document(&mut doc).await, "one\ntwo\nthree");
    }
}
