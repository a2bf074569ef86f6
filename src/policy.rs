use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyErrorKind};

/// An allow-list describing which markup survives sanitization.
///
/// A policy is an immutable value supplied by the caller. Nothing is permitted
/// unless it is listed: tags missing from `valid_tags` are replaced by a
/// space, tags missing from `valid_attrs` accept no attributes, and so on.
///
/// # Examples
///
/// ```
/// use content_core::HtmlPolicy;
///
/// let policy = HtmlPolicy::new()
///     .allow_tags(["a", "b", "br"])
///     .allow_attrs("a", ["href", "target"])
///     .allow_classes(["note-*"])
///     .single_tags(["br"]);
///
/// assert!(policy.is_tag_allowed("a"));
/// assert!(policy.is_attr_allowed("a", "href"));
/// assert!(!policy.is_attr_allowed("b", "href"));
/// assert!(policy.is_class_allowed("note-warning"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HtmlPolicy {
    valid_tags: BTreeSet<String>,
    valid_attrs: BTreeMap<String, BTreeSet<String>>,
    valid_styles: BTreeSet<String>,
    valid_classes: Vec<String>,
    single_tags: BTreeSet<String>,
}

impl HtmlPolicy {
    /// Creates an empty policy that permits no markup at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock policy for rich-text content fields.
    ///
    /// Permits basic inline and block formatting, lists, tables and images,
    /// links with `href`/`target`/`title`, the `color` style property and the
    /// `vitxt-*` / `viur-txt-*` class families.
    pub fn rich_text() -> Self {
        Self::new()
            .allow_tags([
                "b", "a", "i", "u", "span", "div", "p", "img", "ol", "ul", "li", "abbr", "sub",
                "sup", "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead", "tbody", "tfoot",
                "tr", "td", "th", "br", "hr", "strong", "blockquote", "em",
            ])
            .allow_attrs("a", ["href", "target", "title"])
            .allow_attrs("abbr", ["title"])
            .allow_attrs("span", ["title"])
            .allow_attrs("img", ["src", "srcset", "alt", "title"])
            .allow_attrs("td", ["colspan", "rowspan"])
            .allow_attrs("p", ["data-indent"])
            .allow_attrs("blockquote", ["cite"])
            .allow_styles(["color"])
            .allow_classes(["vitxt-*", "viur-txt-*"])
            .single_tags(["br", "img", "hr"])
    }

    /// Loads and validates a policy from its JSON representation.
    ///
    /// Field names follow the camelCase form (`validTags`, `validAttrs`,
    /// `validStyles`, `validClasses`, `singleTags`); missing fields are
    /// empty and unknown fields are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyErrorKind::Malformed`] if the document does not have
    /// the policy shape, and [`PolicyErrorKind::InvalidClassPattern`] if a
    /// class pattern could never match a class token.
    ///
    /// # Examples
    ///
    /// ```
    /// use content_core::HtmlPolicy;
    ///
    /// let policy = HtmlPolicy::from_json(r#"{
    ///     "validTags": ["p", "br"],
    ///     "singleTags": ["br"]
    /// }"#).expect("valid policy");
    /// assert!(policy.is_single_tag("br"));
    ///
    /// assert!(HtmlPolicy::from_json(r#"{"validTag": ["p"]}"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: Self = serde_json::from_str(json)
            .map_err(|err| PolicyError::new(PolicyErrorKind::Malformed, err.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that every class pattern is a class token with an optional
    /// trailing `*`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyErrorKind::InvalidClassPattern`] naming the first
    /// offending pattern.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for pattern in &self.valid_classes {
            let body = pattern.strip_suffix('*').unwrap_or(pattern);
            if !body.chars().all(is_class_char) {
                return Err(PolicyError::new(
                    PolicyErrorKind::InvalidClassPattern,
                    format!("class pattern '{}' may only contain [A-Za-z0-9-] and a trailing '*'", pattern),
                ));
            }
        }
        Ok(())
    }

    /// Adds tags to the set of permitted tags.
    pub fn allow_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Permits the given attributes on `tag`.
    pub fn allow_attrs<I, S>(mut self, tag: impl Into<String>, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_attrs
            .entry(tag.into())
            .or_default()
            .extend(attrs.into_iter().map(Into::into));
        self
    }

    /// Adds CSS property names permitted inside `style` attributes.
    pub fn allow_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_styles.extend(styles.into_iter().map(Into::into));
        self
    }

    /// Adds class patterns. A trailing `*` turns the pattern into a prefix match.
    pub fn allow_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_classes.extend(classes.into_iter().map(Into::into));
        self
    }

    /// Marks tags as void elements: emitted immediately, never closed.
    pub fn single_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.single_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Returns `true` if `tag` may appear in sanitized output.
    pub fn is_tag_allowed(&self, tag: &str) -> bool {
        self.valid_tags.contains(tag)
    }

    /// Returns `true` if `attr` is listed for `tag`.
    pub fn is_attr_allowed(&self, tag: &str, attr: &str) -> bool {
        self.valid_attrs
            .get(tag)
            .is_some_and(|attrs| attrs.contains(attr))
    }

    /// Returns `true` if `property` may appear inside a `style` attribute.
    pub fn is_style_allowed(&self, property: &str) -> bool {
        self.valid_styles.contains(property)
    }

    /// Returns `true` if `class` matches an exact pattern or a `prefix*` pattern.
    ///
    /// Tokens containing anything outside `[A-Za-z0-9-]` never match.
    pub fn is_class_allowed(&self, class: &str) -> bool {
        if class.is_empty() || !class.chars().all(is_class_char) {
            return false;
        }
        self.valid_classes.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => class.starts_with(prefix),
            None => pattern == class,
        })
    }

    /// Returns `true` if `tag` is a void element.
    pub fn is_single_tag(&self, tag: &str) -> bool {
        self.single_tags.contains(tag)
    }
}

fn is_class_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}
