use crate::entities;
use crate::policy::HtmlPolicy;
use crate::tokenizer::{self, TokenSink};

/// Characters that disqualify an attribute key or value.
const FILTER_CHARS: &[char] = &['"', '\'', '\\', '\0', '\r', '\n', '@', '(', ')'];

/// The subset of [`FILTER_CHARS`] still enforced on URL-ish and descriptive
/// attributes, which legitimately contain `@` and parentheses.
const STRICT_FILTER_CHARS: &[char] = &['"', '\'', '\\', '\0', '\r', '\n'];

const RELAXED_ATTRS: [&str; 3] = ["title", "href", "alt"];

fn contains_any(value: &str, chars: &[char]) -> bool {
    value.contains(chars)
}

/// Allow-list HTML sanitizer.
///
/// Produces well-formed markup containing only the tags, attributes, style
/// properties and classes permitted by an [`HtmlPolicy`]. All text content is
/// escaped. Disallowed tags are replaced by a single space so that adjacent
/// words never merge, elements that end up without content are dropped, and
/// every element left open is closed.
///
/// Sanitizing never fails; hostile or malformed input degrades towards plain
/// text.
///
/// # Examples
///
/// ```
/// use content_core::{HtmlPolicy, HtmlSanitizer};
///
/// let policy = HtmlPolicy::new()
///     .allow_tags(["a", "b"])
///     .allow_attrs("a", ["href"]);
/// let sanitizer = HtmlSanitizer::new(&policy);
///
/// assert_eq!(
///     sanitizer.sanitize(r#"<a href="x" onclick="evil()">t</a>"#),
///     r#"<a href="x">t</a>"#
/// );
/// assert_eq!(sanitizer.sanitize("<b>bold<script>x</script>"), "<b>bold </b>");
/// assert_eq!(sanitizer.sanitize("<b></b>"), "");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HtmlSanitizer<'p> {
    policy: Option<&'p HtmlPolicy>,
}

impl<'p> HtmlSanitizer<'p> {
    /// Creates a sanitizer enforcing `policy`.
    pub fn new(policy: &'p HtmlPolicy) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    /// Creates a sanitizer that removes all markup, keeping escaped text.
    ///
    /// Every tag becomes a single space; end tags are ignored.
    ///
    /// ```
    /// use content_core::HtmlSanitizer;
    ///
    /// assert_eq!(HtmlSanitizer::strip_all().sanitize("a<p>b</p>c"), "a bc");
    /// ```
    pub fn strip_all() -> Self {
        Self { policy: None }
    }

    /// Sanitizes an untrusted HTML fragment.
    ///
    /// Newlines are replaced by spaces before tokenizing. Each call works on
    /// fresh parse state, so a sanitizer may be shared freely.
    pub fn sanitize(&self, input: &str) -> String {
        let mut state = ParseState::new(self.policy);
        tokenizer::tokenize(&input.replace('\n', " "), &mut state);
        let result = state.cleanup();
        tracing::trace!(
            input_len = input.len(),
            output_len = result.len(),
            "sanitized html fragment"
        );
        result
    }
}

/// An opening tag whose markup is held back until content proves the element
/// is not empty.
#[derive(Debug)]
struct PendingTag {
    markup: String,
    tag: String,
}

/// Mutable state for a single sanitize call.
///
/// Every name on `open_tags` has its opening markup in `result`; every entry
/// of `tag_cache` has its markup nowhere yet.
#[derive(Debug)]
struct ParseState<'p> {
    policy: Option<&'p HtmlPolicy>,
    result: String,
    /// Elements written to `result` and awaiting a close tag; top is last.
    open_tags: Vec<String>,
    /// Elements opened but not yet committed, in opening order.
    tag_cache: Vec<PendingTag>,
}

impl<'p> ParseState<'p> {
    fn new(policy: Option<&'p HtmlPolicy>) -> Self {
        Self {
            policy,
            result: String::new(),
            open_tags: Vec::new(),
            tag_cache: Vec::new(),
        }
    }

    /// Commits all pending tags to the output and makes them open.
    fn flush_cache(&mut self) {
        for pending in self.tag_cache.drain(..) {
            self.result.push_str(&pending.markup);
            self.open_tags.push(pending.tag);
        }
    }

    fn close_tag(&mut self, tag: &str) {
        self.result.push_str("</");
        self.result.push_str(tag);
        self.result.push('>');
    }

    /// Flushes pending tags (they count as having content) and closes
    /// everything still open, innermost first.
    fn cleanup(mut self) -> String {
        self.flush_cache();
        while let Some(tag) = self.open_tags.pop() {
            self.close_tag(&tag);
        }
        self.result
    }
}

/// Builds `<tag attr="..."` from the attributes that survive the policy.
fn opening_markup(policy: &HtmlPolicy, tag: &str, attrs: &[(String, String)]) -> String {
    let mut markup = format!("<{}", tag);
    let mut blank_target = false;
    let mut styles: Option<&str> = None;
    let mut classes: Option<&str> = None;

    for (key, value) in attrs {
        let key = key.trim();
        let value = value.trim();

        if contains_any(key, FILTER_CHARS) || contains_any(value, FILTER_CHARS) {
            let relaxed = RELAXED_ATTRS.contains(&key) && !contains_any(value, STRICT_FILTER_CHARS);
            if !relaxed {
                tracing::debug!(tag, attr = key, "dropping attribute with filtered characters");
                continue;
            }
        } else if key == "class" {
            classes = Some(value);
            continue;
        } else if key == "style" {
            styles = Some(value);
            continue;
        } else if key == "src" && !is_safe_src(value) {
            tracing::debug!(tag, attr = key, "dropping src without http(s) or root-relative url");
            continue;
        }

        if !policy.is_attr_allowed(tag, key) {
            tracing::debug!(tag, attr = key, "dropping attribute not allowed on tag");
            continue;
        }

        if starts_with_ignore_case(key, "on") || is_script_uri(value) {
            tracing::debug!(tag, attr = key, "dropping script attribute");
            continue;
        }

        markup.push_str(&format!(" {}=\"{}\"", key, value));
        if tag == "a" && key == "target" && value.eq_ignore_ascii_case("_blank") {
            blank_target = true;
        }
    }

    if let Some(styles) = styles {
        let declarations = sanitize_styles(policy, styles);
        if !declarations.is_empty() {
            markup.push_str(&format!(" style=\"{}\"", declarations));
        }
    }

    if let Some(classes) = classes {
        let kept: Vec<&str> = classes
            .split(' ')
            .filter(|class| {
                let allowed = policy.is_class_allowed(class);
                if !allowed && !class.is_empty() {
                    tracing::debug!(tag, class = *class, "dropping class");
                }
                allowed
            })
            .collect();
        if !kept.is_empty() {
            markup.push_str(&format!(" class=\"{}\"", kept.join(" ")));
        }
    }

    if blank_target {
        // Keeps the opened page from reaching window.opener.
        markup.push_str(" rel=\"noopener noreferrer\"");
    }

    markup
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn is_safe_src(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with('/')
}

/// Browsers ignore whitespace and control characters inside a URL scheme,
/// so they are skipped before comparing.
fn is_script_uri(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .take("javascript".len())
        .collect();
    compact.eq_ignore_ascii_case("javascript")
}

/// Filters a `style` attribute down to permitted `property: value` pairs.
///
/// Later declarations of the same property replace earlier ones in place.
fn sanitize_styles(policy: &HtmlPolicy, styles: &str) -> String {
    let mut kept: Vec<(&str, &str)> = Vec::new();

    for declaration in styles.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim();
        let value = value.trim();

        if contains_any(property, FILTER_CHARS) || contains_any(value, FILTER_CHARS) {
            continue;
        }
        // Legacy IE evaluates script in `expression(...)`.
        if starts_with_ignore_case(value, "expression") || starts_with_ignore_case(value, "import") {
            continue;
        }
        if !policy.is_style_allowed(property) || value.contains(['"', ':', ';']) {
            tracing::debug!(style = property, "dropping style declaration");
            continue;
        }

        match kept.iter_mut().find(|(existing, _)| *existing == property) {
            Some(entry) => entry.1 = value,
            None => kept.push((property, value)),
        }
    }

    kept.iter()
        .map(|(property, value)| format!("{}: {}", property, value))
        .collect::<Vec<_>>()
        .join("; ")
}

impl TokenSink for ParseState<'_> {
    fn handle_data(&mut self, data: &str) {
        let mut escaped = String::with_capacity(data.len());
        for c in data.chars() {
            match c {
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                '\0' => {}
                _ => escaped.push(c),
            }
        }
        if !escaped.trim().is_empty() {
            self.flush_cache();
            self.result.push_str(&escaped);
        }
    }

    fn handle_charref(&mut self, name: &str) {
        self.flush_cache();
        self.result.push_str("&#");
        self.result.push_str(name);
        self.result.push(';');
    }

    fn handle_entityref(&mut self, name: &str) {
        if entities::is_known_entity(name) {
            self.flush_cache();
            self.result.push('&');
            self.result.push_str(name);
            self.result.push(';');
        }
    }

    fn handle_starttag(&mut self, tag: &str, attrs: &[(String, String)]) {
        let Some(policy) = self.policy.filter(|policy| policy.is_tag_allowed(tag)) else {
            tracing::debug!(tag, "replacing disallowed tag");
            self.result.push(' ');
            return;
        };

        let mut markup = opening_markup(policy, tag, attrs);
        markup.push('>');

        if policy.is_single_tag(tag) {
            // Void elements are visible on their own and are never discarded.
            self.flush_cache();
            self.result.push_str(&markup);
        } else {
            self.tag_cache.push(PendingTag {
                markup,
                tag: tag.to_string(),
            });
        }
    }

    fn handle_endtag(&mut self, tag: &str) {
        if self.policy.is_none() {
            return;
        }

        let cached = self.tag_cache.iter().any(|pending| pending.tag == tag);
        if !self.tag_cache.is_empty() && (cached || self.open_tags.iter().any(|open| open == tag)) {
            // Anything still cached never received content; drop it, and
            // stop once the element being closed has been dropped.
            while let Some(pending) = self.tag_cache.pop() {
                if pending.tag == tag {
                    return;
                }
            }
        }

        if self.open_tags.iter().any(|open| open == tag) {
            while let Some(open) = self.open_tags.pop() {
                self.close_tag(&open);
                if open == tag {
                    break;
                }
            }
        }
    }

    fn handle_rawtext(&mut self, tag: &str, text: &str) {
        if self.policy.is_some_and(|policy| policy.is_tag_allowed(tag)) {
            self.handle_data(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rich(input: &str) -> String {
        HtmlSanitizer::new(&HtmlPolicy::rich_text()).sanitize(input)
    }

    fn with(policy: &HtmlPolicy, input: &str) -> String {
        HtmlSanitizer::new(policy).sanitize(input)
    }

    #[test]
    fn disallowed_tag_becomes_single_space() {
        let policy = HtmlPolicy::new();
        assert_eq!(with(&policy, "<script>alert(1)</script>"), " ");
        assert_eq!(with(&policy, "one<iframe>two"), "one two");
    }

    #[test]
    fn disallowed_raw_text_content_is_dropped() {
        assert_eq!(rich("a<style>p { color: red }</style>b"), "a b");
    }

    #[test]
    fn allowed_raw_text_content_is_escaped() {
        let policy = HtmlPolicy::new().allow_tags(["style"]);
        assert_eq!(with(&policy, "<style>a>b</style>"), "<style>a&gt;b</style>");
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(rich("a \"b\" 'c' \0d"), "a &quot;b&quot; &#39;c&#39; d");
        assert_eq!(rich("1 < 2 > 0"), "1 &lt; 2 &gt; 0");
    }

    #[test]
    fn newlines_become_spaces() {
        assert_eq!(rich("<p>a\nb</p>"), "<p>a b</p>");
    }

    #[test]
    fn attributes_outside_allow_list_are_dropped() {
        let policy = HtmlPolicy::new().allow_tags(["a"]).allow_attrs("a", ["href"]);
        assert_eq!(
            with(&policy, r#"<a href="x" onclick="evil()">t</a>"#),
            r#"<a href="x">t</a>"#
        );
        assert_eq!(with(&policy, r#"<a title="x">t</a>"#), "<a>t</a>");
    }

    #[test]
    fn event_handlers_are_dropped_even_when_allowed() {
        let policy = HtmlPolicy::new()
            .allow_tags(["b"])
            .allow_attrs("b", ["onmouseover", "title"]);
        assert_eq!(
            with(&policy, r#"<b onmouseover="x" title="ok">t</b>"#),
            r#"<b title="ok">t</b>"#
        );
    }

    #[test]
    fn javascript_urls_are_dropped() {
        assert_eq!(rich(r#"<a href="javascript:alert`1`">t</a>"#), "<a>t</a>");
        assert_eq!(rich(r#"<a href="JavaScript:void">t</a>"#), "<a>t</a>");
        assert_eq!(rich("<a href=\"java\tscript:x\">t</a>"), "<a>t</a>");
        assert_eq!(rich(r#"<a href="&#106;avascript:x">t</a>"#), "<a>t</a>");
    }

    #[test]
    fn filter_characters_drop_attributes() {
        assert_eq!(rich(r#"<td colspan="2)">t</td>"#), "<td>t</td>");
        assert_eq!(rich(r#"<a href="&quot;x">t</a>"#), "<a>t</a>");
        assert_eq!(rich(r#"<a href="a\b">t</a>"#), "<a>t</a>");
    }

    #[test]
    fn relaxed_attributes_tolerate_at_and_parens() {
        assert_eq!(
            rich(r#"<a href="mailto:me@example.com" title="Me (work)">t</a>"#),
            r#"<a href="mailto:me@example.com" title="Me (work)">t</a>"#
        );
        assert_eq!(
            rich(r#"<img src="/a.png" alt="smile :)">"#),
            r#"<img src="/a.png" alt="smile :)">"#
        );
    }

    #[test]
    fn src_requires_http_or_root_relative_url() {
        assert_eq!(rich(r#"<img src="https://e.org/a.png">"#), r#"<img src="https://e.org/a.png">"#);
        assert_eq!(rich(r#"<img src="/a.png">"#), r#"<img src="/a.png">"#);
        assert_eq!(rich(r#"<img src="data:image/png;base64,AAAA">"#), "<img>");
        assert_eq!(rich(r#"<img src="a.png">"#), "<img>");
    }

    #[test]
    fn unquoted_url_ending_in_slash_keeps_link() {
        assert_eq!(
            rich("<a href=https://example.com/>Example</a>"),
            r#"<a href="https://example.com/">Example</a>"#
        );
        assert_eq!(rich("<a href=x/>t"), r#"<a href="x/">t</a>"#);
    }

    #[test]
    fn blank_target_gets_noopener() {
        assert_eq!(
            rich(r#"<a href="/x" target="_BLANK">t</a>"#),
            r#"<a href="/x" target="_BLANK" rel="noopener noreferrer">t</a>"#
        );
        assert_eq!(
            rich(r#"<a href="/x" target="_self">t</a>"#),
            r#"<a href="/x" target="_self">t</a>"#
        );
    }

    #[test]
    fn styles_are_filtered_per_declaration() {
        let policy = HtmlPolicy::new()
            .allow_tags(["span"])
            .allow_styles(["color", "font-weight"]);
        assert_eq!(
            with(&policy, r#"<span style="color: red; background: blue;font-weight:bold">t</span>"#),
            r#"<span style="color: red; font-weight: bold">t</span>"#
        );
    }

    #[test]
    fn style_expressions_and_imports_are_dropped() {
        let policy = HtmlPolicy::new().allow_tags(["span"]).allow_styles(["color"]);
        assert_eq!(with(&policy, r#"<span style="color: Expression">t</span>"#), "<span>t</span>");
        assert_eq!(with(&policy, r#"<span style="color: import x">t</span>"#), "<span>t</span>");
        assert_eq!(with(&policy, r#"<span style="color: url(x)">t</span>"#), "<span>t</span>");
        assert_eq!(with(&policy, r#"<span style="color">t</span>"#), "<span>t</span>");
    }

    #[test]
    fn repeated_style_property_keeps_last_value() {
        let policy = HtmlPolicy::new().allow_tags(["span"]).allow_styles(["color"]);
        assert_eq!(
            with(&policy, r#"<span style="color: red; color: blue">t</span>"#),
            r#"<span style="color: blue">t</span>"#
        );
    }

    #[test]
    fn classes_match_exact_and_wildcard_patterns() {
        let policy = HtmlPolicy::new().allow_tags(["p"]).allow_classes(["viur-txt-*", "lead"]);
        assert_eq!(
            with(&policy, r#"<p class="viur-txt-bold evil-class lead">t</p>"#),
            r#"<p class="viur-txt-bold lead">t</p>"#
        );
        assert_eq!(with(&policy, r#"<p class="evil">t</p>"#), "<p>t</p>");
        assert_eq!(with(&policy, r#"<p class="viur-txt-a_b">t</p>"#), "<p>t</p>");
    }

    #[test]
    fn attribute_order_is_attrs_style_class_rel() {
        let policy = HtmlPolicy::new()
            .allow_tags(["a"])
            .allow_attrs("a", ["href", "target"])
            .allow_styles(["color"])
            .allow_classes(["c"]);
        assert_eq!(
            with(&policy, r#"<a class="c" style="color: red" target="_blank" href="/">t</a>"#),
            r#"<a target="_blank" href="/" style="color: red" class="c" rel="noopener noreferrer">t</a>"#
        );
    }

    #[test]
    fn empty_elements_are_discarded() {
        assert_eq!(rich("<span></span>"), "");
        assert_eq!(rich("<span>hi</span>"), "<span>hi</span>");
        assert_eq!(rich("<p><b> </b></p>"), "");
        assert_eq!(rich("<p><b></b>x</p>"), "<p>x</p>");
        assert_eq!(rich("<span/>"), "");
    }

    #[test]
    fn void_tags_are_always_emitted() {
        assert_eq!(rich("<br>"), "<br>");
        assert_eq!(rich("<br/>"), "<br>");
        assert_eq!(rich("<p><br></p>"), "<p><br></p>");
        assert_eq!(rich("<hr></hr>"), "<hr>");
    }

    #[test]
    fn unclosed_tags_are_closed_at_end() {
        assert_eq!(rich("<p><b>x"), "<p><b>x</b></p>");
        assert_eq!(rich("<p><b>"), "<p><b></b></p>");
    }

    #[test]
    fn mismatched_nesting_is_force_closed() {
        assert_eq!(rich("<b><i>x</b></i>"), "<b><i>x</i></b>");
        assert_eq!(rich("<b>x<i></b>y"), "<b>x</b>y");
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        assert_eq!(rich("a</b>c"), "ac");
        assert_eq!(rich("<p>a</b>c</p>"), "<p>ac</p>");
    }

    #[test]
    fn character_references() {
        // Whitespace-only text between references carries no content.
        assert_eq!(rich("&copy; &#169; &#xA9;"), "&copy;&#169;&#xA9;");
        assert_eq!(rich("a &bogus; b"), "a  b");
        assert_eq!(rich("<b>&amp;</b>"), "<b>&amp;</b>");
    }

    #[test]
    fn strip_all_removes_every_tag() {
        let sanitizer = HtmlSanitizer::strip_all();
        assert_eq!(sanitizer.sanitize("<p>Hello <b>World</b></p>"), " Hello  World");
        assert_eq!(sanitizer.sanitize("<script>x</script>y"), " y");
    }

    #[test]
    fn sanitizer_is_reusable() {
        let policy = HtmlPolicy::rich_text();
        let sanitizer = HtmlSanitizer::new(&policy);
        assert_eq!(sanitizer.sanitize("<b>x"), "<b>x</b>");
        assert_eq!(sanitizer.sanitize("y"), "y");
    }

    mod proptests {
        use super::*;
        use crate::test_utils::{arb_markup, is_well_formed};
        use proptest::prelude::*;

        proptest! {
            /// Property: output never contains an opening tag outside the policy
            #[test]
            fn proptest_output_only_contains_allowed_tags(input in arb_markup()) {
                let output = rich(&input).to_lowercase();
                for forbidden in ["<script", "<iframe", "<object", "<svg", "onerror", "onclick", "javascript"] {
                    prop_assert!(!output.contains(forbidden), "{} leaked into {}", forbidden, output);
                }
            }

            /// Property: every element in the output is closed in order
            #[test]
            fn proptest_output_is_well_formed(input in arb_markup()) {
                let policy = HtmlPolicy::rich_text();
                let output = with(&policy, &input);
                prop_assert!(is_well_formed(&output, &policy), "malformed: {}", output);
            }
        }
    }
}
