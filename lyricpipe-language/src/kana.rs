//! Local Japanese romanization.

use async_trait::async_trait;
use lyricpipe_core::{CoreError, RomanizationProvider, Romanizer};

/// Romanizes Japanese kana and kanji offline.
///
/// Text without Japanese characters is returned unchanged, so lyrics in other
/// scripts never produce an extra row.
#[derive(Debug, Default, Clone, Copy)]
pub struct KanaRomanizer;

impl KanaRomanizer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

const fn is_kana(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}' // hiragana
        | '\u{30A0}'..='\u{30FF}' // katakana
        | '\u{31F0}'..='\u{31FF}' // katakana phonetic extensions
        | '\u{FF66}'..='\u{FF9F}') // halfwidth katakana
}

const fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{3005}')
}

/// Whether `text` should be read as Japanese.
///
/// Kana is unambiguous. Kanji alone is only treated as Japanese when the
/// document language is Japanese or unknown, so Chinese lyrics are left alone.
fn is_japanese(text: &str, language: &str) -> bool {
    let language_allows_kanji = language.is_empty() || language.eq_ignore_ascii_case("ja");
    text.chars()
        .any(|c| is_kana(c) || (language_allows_kanji && is_kanji(c)))
}

/// Romanize synchronously; exposed for callers outside an async context.
#[must_use]
pub fn romanize_japanese(text: &str, language: &str) -> String {
    if !is_japanese(text, language) {
        return text.to_string();
    }
    kakasi::convert(text).romaji.trim().to_string()
}

#[async_trait]
impl Romanizer for KanaRomanizer {
    fn provider(&self) -> RomanizationProvider {
        RomanizationProvider::Kuroshiro
    }

    async fn romanize(&self, text: &str, language: &str) -> Result<String, CoreError> {
        Ok(romanize_japanese(text, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection() {
        assert!(is_japanese("ひらがな", "ja"));
        assert!(is_japanese("カタカナ", "en"));
        assert!(is_japanese("夜に駆ける", ""));
        assert!(!is_japanese("我爱你", "zh"));
        assert!(!is_japanese("hello", "ja"));
        assert!(!is_japanese("사랑해", "ko"));
    }

    #[test]
    fn test_non_japanese_unchanged() {
        assert_eq!(romanize_japanese("Never gonna give you up", "en"), "Never gonna give you up");
        assert_eq!(romanize_japanese("我爱你", "zh"), "我爱你");
        assert_eq!(romanize_japanese("♪", "ja"), "♪");
    }

    #[test]
    fn test_japanese_is_romanized() {
        let romanized = romanize_japanese("ひらがな", "ja");

        assert!(!romanized.is_empty());
        assert!(romanized.is_ascii());
        assert!(romanized.contains("hiragana"));
    }

    #[tokio::test]
    async fn test_romanizer_trait() {
        let romanizer = KanaRomanizer::new();

        assert_eq!(romanizer.provider(), RomanizationProvider::Kuroshiro);
        assert_eq!(romanizer.romanize("abc", "ja").await.unwrap(), "abc");
    }
}
