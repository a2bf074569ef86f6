use std::collections::BTreeMap;

use crate::error::{FieldError, TranslationsError};
use crate::policy::HtmlPolicy;
use crate::sanitizer::HtmlSanitizer;

/// Default maximum value length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 200_000;

/// Characters kept in search tags by default.
pub const DEFAULT_SEARCH_CHARS: &str = "abcdefghijklmnopqrstuvwxyzäöüß0123456789";

const DOWNLOAD_PREFIX: &str = "/file/download/";

/// Translated values keyed by language code.
pub type Translations = BTreeMap<String, String>;

/// A rich-text field: validates and sanitizes user-submitted markup.
///
/// Without a policy the field stores plain text, every tag being stripped.
///
/// # Examples
///
/// ```
/// use content_core::{FieldError, HtmlPolicy, TextField};
///
/// let field = TextField::new(Some(HtmlPolicy::rich_text())).max_length(20);
///
/// assert_eq!(field.from_client(Some("<b>hi</b><script>")).unwrap(), "<b>hi</b> ");
/// assert_eq!(field.from_client(None), Err(FieldError::NoValue));
/// assert_eq!(field.from_client(Some(&"x".repeat(21))), Err(FieldError::TooLong { max: 20 }));
/// ```
#[derive(Debug, Clone)]
pub struct TextField {
    policy: Option<HtmlPolicy>,
    max_length: usize,
    languages: Vec<String>,
    search_chars: String,
}

impl TextField {
    /// Creates a field sanitizing with `policy`, or stripping all markup when
    /// `policy` is `None`.
    pub fn new(policy: Option<HtmlPolicy>) -> Self {
        Self {
            policy,
            max_length: DEFAULT_MAX_LENGTH,
            languages: Vec::new(),
            search_chars: DEFAULT_SEARCH_CHARS.to_string(),
        }
    }

    /// Sets the maximum value length in characters.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Makes the field translatable into the given languages.
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the set of characters kept in search tags.
    pub fn search_chars(mut self, chars: impl Into<String>) -> Self {
        self.search_chars = chars.into();
        self
    }

    /// The configured languages; empty if the field is not translatable.
    pub fn configured_languages(&self) -> &[String] {
        &self.languages
    }

    fn sanitizer(&self) -> HtmlSanitizer<'_> {
        match &self.policy {
            Some(policy) => HtmlSanitizer::new(policy),
            None => HtmlSanitizer::strip_all(),
        }
    }

    /// Checks the length limit.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::TooLong`] if `value` has more than the maximum
    /// number of characters.
    pub fn validate(&self, value: &str) -> Result<(), FieldError> {
        if value.chars().count() > self.max_length {
            return Err(FieldError::TooLong {
                max: self.max_length,
            });
        }
        Ok(())
    }

    /// Validates and sanitizes a submitted value.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::NoValue`] for a missing or empty value and
    /// [`FieldError::TooLong`] if the length limit is exceeded.
    pub fn from_client(&self, value: Option<&str>) -> Result<String, FieldError> {
        let value = value.filter(|v| !v.is_empty()).ok_or(FieldError::NoValue)?;
        self.validate(value)?;
        Ok(self.sanitizer().sanitize(value))
    }

    /// Validates and sanitizes submitted translations.
    ///
    /// Only configured languages are read. Every entry is checked, and the
    /// submission is accepted only if none failed validation and at least
    /// one language yields a non-empty value.
    ///
    /// # Errors
    ///
    /// Returns the last validation failure if any entry failed, or
    /// [`FieldError::NoValidTranslations`] if nothing usable was submitted.
    /// The error carries the entries that did pass.
    pub fn from_client_translations(&self, values: &Translations) -> Result<Translations, TranslationsError> {
        let sanitizer = self.sanitizer();
        let mut accepted = Translations::new();
        let mut last_error = None;

        for lang in &self.languages {
            let Some(value) = values.get(lang) else {
                continue;
            };
            match self.validate(value) {
                Ok(()) => {
                    accepted.insert(lang.clone(), sanitizer.sanitize(value));
                }
                Err(err) => {
                    tracing::debug!(lang = %lang, error = %err, "rejecting translation");
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            return Err(TranslationsError::new(err, accepted));
        }
        if !accepted.values().any(|v| !v.is_empty()) {
            return Err(TranslationsError::new(FieldError::NoValidTranslations, accepted));
        }
        Ok(accepted)
    }

    /// Returns `true` if `value` has no visible content: nothing but
    /// whitespace once markup is stripped, and no image.
    pub fn is_blank(value: &str) -> bool {
        HtmlSanitizer::strip_all().sanitize(value).trim().is_empty() && !value.contains("<img ")
    }

    /// Drops blank translations, e.g. a body consisting of an empty `<p>`,
    /// before a value is persisted.
    pub fn non_blank_translations(&self, values: &Translations) -> Translations {
        self.languages
            .iter()
            .filter_map(|lang| values.get(lang).map(|value| (lang, value)))
            .filter(|(_, value)| !Self::is_blank(value))
            .map(|(lang, value)| (lang.clone(), value.clone()))
            .collect()
    }

    /// Keys of files linked through `/file/download/<key>` URLs, in
    /// first-seen order without duplicates.
    pub fn referenced_blobs(value: &str) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let mut rest = value;

        while let Some(idx) = rest.find(DOWNLOAD_PREFIX) {
            let after = &rest[idx + DOWNLOAD_PREFIX.len()..];
            let end = after.find(['/', '"']).unwrap_or(after.len());
            let key = &after[..end];
            if !key.is_empty() && !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
            rest = &after[end..];
        }

        keys
    }

    /// Like [`referenced_blobs`](Self::referenced_blobs) across all translations.
    pub fn referenced_blobs_in(values: &Translations) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in values.values().flat_map(|value| Self::referenced_blobs(value)) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Words for a search index: markup stripped, lowercased, restricted to
    /// the search character set, longer than three characters, deduplicated.
    pub fn search_tags(&self, value: &str) -> Vec<String> {
        let plain = HtmlSanitizer::strip_all().sanitize(&value.to_lowercase());
        let mut tags: Vec<String> = Vec::new();

        for word in plain.split(' ') {
            let word: String = word
                .chars()
                .filter(|c| self.search_chars.contains(*c))
                .collect();
            if word.chars().count() > 3 && !tags.contains(&word) {
                tags.push(word);
            }
        }

        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translations(pairs: &[(&str, &str)]) -> Translations {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn from_client_sanitizes_with_policy() {
        let field = TextField::new(Some(HtmlPolicy::rich_text()));
        assert_eq!(
            field.from_client(Some(r#"<p onclick="x">Hi</p>"#)).unwrap(),
            "<p>Hi</p>"
        );
    }

    #[test]
    fn from_client_without_policy_strips_markup() {
        let field = TextField::new(None);
        assert_eq!(field.from_client(Some("<p>Hi</p>")).unwrap(), " Hi");
    }

    #[test]
    fn from_client_rejects_missing_values() {
        let field = TextField::new(None);
        assert_eq!(field.from_client(None), Err(FieldError::NoValue));
        assert_eq!(field.from_client(Some("")), Err(FieldError::NoValue));
    }

    #[test]
    fn validate_counts_characters_not_bytes() {
        let field = TextField::new(None).max_length(3);
        assert!(field.validate("äöü").is_ok());
        assert_eq!(field.validate("äöüß"), Err(FieldError::TooLong { max: 3 }));
    }

    #[test]
    fn translations_keep_configured_languages_only() {
        let field = TextField::new(Some(HtmlPolicy::rich_text())).languages(["de", "en"]);
        let result = field
            .from_client_translations(&translations(&[("de", "<b>Hallo</b>"), ("fr", "Salut")]))
            .unwrap();

        assert_eq!(result, translations(&[("de", "<b>Hallo</b>")]));
    }

    #[test]
    fn translations_fail_when_any_entry_is_invalid() {
        let field = TextField::new(None).languages(["de", "en"]).max_length(5);
        let err = field
            .from_client_translations(&translations(&[("de", "zu lang"), ("en", "ok")]))
            .unwrap_err();

        assert_eq!(err.error(), &FieldError::TooLong { max: 5 });
        assert_eq!(err.accepted(), &translations(&[("en", "ok")]));
    }

    #[test]
    fn translations_report_last_error() {
        let field = TextField::new(None).languages(["de", "en"]).max_length(2);
        let err = field
            .from_client_translations(&translations(&[("de", "lang"), ("en", "x")]))
            .unwrap_err();

        assert_eq!(err.error(), &FieldError::TooLong { max: 2 });
        assert_eq!(err.into_accepted(), translations(&[("en", "x")]));
    }

    #[test]
    fn translations_require_some_value() {
        let field = TextField::new(None).languages(["de", "en"]);
        let err = field.from_client_translations(&Translations::new()).unwrap_err();
        assert_eq!(err.error(), &FieldError::NoValidTranslations);

        let err = field
            .from_client_translations(&translations(&[("de", "")]))
            .unwrap_err();
        assert_eq!(err.error(), &FieldError::NoValidTranslations);
    }

    #[test]
    fn blank_detection() {
        assert!(TextField::is_blank("<p></p>"));
        assert!(TextField::is_blank("<p> <br> </p>"));
        assert!(!TextField::is_blank("<p>x</p>"));
        assert!(!TextField::is_blank(r#"<p><img src="/a.png"></p>"#));
    }

    #[test]
    fn non_blank_translations_drop_empty_bodies() {
        let field = TextField::new(Some(HtmlPolicy::rich_text())).languages(["de", "en"]);
        let kept = field.non_blank_translations(&translations(&[("de", "<p></p>"), ("en", "<p>Hi</p>")]));
        assert_eq!(kept, translations(&[("en", "<p>Hi</p>")]));
    }

    #[test]
    fn referenced_blobs_are_extracted_in_order() {
        let value = r#"<img src="/file/download/abc/pic.png"><a href="/file/download/def">x</a><img src="/file/download/abc/pic.png">"#;
        assert_eq!(TextField::referenced_blobs(value), vec!["abc", "def"]);
    }

    #[test]
    fn referenced_blob_at_end_of_text() {
        assert_eq!(TextField::referenced_blobs("see /file/download/xyz"), vec!["xyz"]);
        assert!(TextField::referenced_blobs("no links").is_empty());
    }

    #[test]
    fn referenced_blobs_across_translations() {
        let values = translations(&[
            ("de", "/file/download/a/"),
            ("en", "/file/download/a/ /file/download/b/"),
        ]);
        assert_eq!(TextField::referenced_blobs_in(&values), vec!["a", "b"]);
    }

    #[test]
    fn search_tags_filter_and_deduplicate() {
        let field = TextField::new(None);
        assert_eq!(
            field.search_tags("<p>Straße, Haus! haus <b>und</b> Äpfel</p>"),
            vec!["straße", "haus", "äpfel"]
        );
    }

    #[test]
    fn search_tags_use_configured_chars() {
        let field = TextField::new(None).search_chars("abc");
        assert_eq!(field.search_tags("aabbcc abcd"), vec!["aabbcc"]);
    }
}
