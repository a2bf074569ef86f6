//! Streaming HTML tokenizer.
//!
//! The tokenizer makes a single left-to-right pass over the input and reports
//! what it finds to a [`TokenSink`]. It is deliberately forgiving: anything it
//! cannot recognise as markup is reported as text, and markup left unterminated
//! at the end of the input is reported as text as well. Comments, doctypes and
//! processing instructions are consumed silently.

use std::sync::OnceLock;

use regex::Regex;

use crate::entities;

/// Elements whose content is raw text rather than markup.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Receiver for tokenizer events.
pub(crate) trait TokenSink {
    /// Text between markup. May be delivered in several fragments.
    fn handle_data(&mut self, data: &str);

    /// A numeric character reference; `name` is the part after `&#`
    /// (e.g. `"169"` or `"xA9"`).
    fn handle_charref(&mut self, name: &str);

    /// A named character reference; `name` is the part after `&`.
    fn handle_entityref(&mut self, name: &str);

    /// An opening tag. Names are lowercased and attribute values unescaped.
    fn handle_starttag(&mut self, tag: &str, attrs: &[(String, String)]);

    /// A closing tag, lowercased.
    fn handle_endtag(&mut self, tag: &str);

    /// A `<tag/>` form.
    fn handle_startendtag(&mut self, tag: &str, attrs: &[(String, String)]) {
        self.handle_starttag(tag, attrs);
        self.handle_endtag(tag);
    }

    /// Content of a raw-text element such as `script`.
    fn handle_rawtext(&mut self, _tag: &str, text: &str) {
        self.handle_data(text);
    }
}

fn charref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^&#([0-9]+|[xX][0-9a-fA-F]+)").expect("valid regex"))
}

fn entityref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^&([a-zA-Z][-.a-zA-Z0-9]*)").expect("valid regex"))
}

fn raw_text_end_regex(tag: &str) -> &'static Regex {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    let cell = match tag {
        "script" => &SCRIPT,
        "style" => &STYLE,
        other => unreachable!("no raw text end pattern for <{}>", other),
    };
    cell.get_or_init(|| Regex::new(&format!(r"(?i)</\s*{}\s*>", tag)).expect("valid regex"))
}

/// Runs the tokenizer over `input` to completion.
pub(crate) fn tokenize<S: TokenSink>(input: &str, sink: &mut S) {
    Tokenizer { input, pos: 0 }.run(sink);
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

/// A parsed opening tag.
struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    end: usize,
}

impl<'a> Tokenizer<'a> {
    fn run<S: TokenSink>(&mut self, sink: &mut S) {
        let len = self.input.len();
        while self.pos < len {
            let rest = &self.input[self.pos..];
            let next = rest.find(['<', '&']).map_or(len, |idx| self.pos + idx);
            if next > self.pos {
                sink.handle_data(&self.input[self.pos..next]);
                self.pos = next;
                continue;
            }

            if rest.starts_with('<') {
                self.markup(sink);
            } else {
                self.reference(sink);
            }
        }
    }

    fn byte_at(&self, idx: usize) -> Option<u8> {
        self.input.as_bytes().get(idx).copied()
    }

    /// Reports the remainder of the input as text and stops.
    fn rest_as_data<S: TokenSink>(&mut self, sink: &mut S) {
        sink.handle_data(&self.input[self.pos..]);
        self.pos = self.input.len();
    }

    fn markup<S: TokenSink>(&mut self, sink: &mut S) {
        let start = self.pos;
        match self.byte_at(start + 1) {
            Some(b) if b.is_ascii_alphabetic() => match self.parse_starttag(start) {
                Some(tag) => {
                    self.pos = tag.end;
                    if tag.self_closing {
                        sink.handle_startendtag(&tag.name, &tag.attrs);
                    } else {
                        sink.handle_starttag(&tag.name, &tag.attrs);
                        if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                            self.raw_text(&tag.name, sink);
                        }
                    }
                }
                None => self.rest_as_data(sink),
            },
            Some(b'/') => self.endtag(sink),
            Some(b'!') => {
                if self.input[start..].starts_with("<!--") {
                    self.skip_past(start + 4, "-->", sink);
                } else {
                    self.skip_past(start + 2, ">", sink);
                }
            }
            Some(b'?') => self.skip_past(start + 2, ">", sink),
            _ => {
                sink.handle_data("<");
                self.pos = start + 1;
            }
        }
    }

    /// Consumes everything up to and including `terminator`, or reports the
    /// rest of the input as text if it never appears.
    fn skip_past<S: TokenSink>(&mut self, from: usize, terminator: &str, sink: &mut S) {
        match self.input[from..].find(terminator) {
            Some(idx) => self.pos = from + idx + terminator.len(),
            None => self.rest_as_data(sink),
        }
    }

    fn endtag<S: TokenSink>(&mut self, sink: &mut S) {
        let start = self.pos;
        let Some(close) = self.input[start..].find('>') else {
            self.rest_as_data(sink);
            return;
        };
        self.pos = start + close + 1;

        let inner = self.input[start + 2..start + close].trim_start();
        // `</>` and `</ 3>` are dropped like comments.
        if !inner.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return;
        }
        let name_len = inner
            .find(|c: char| c.is_whitespace() || c == '/')
            .unwrap_or(inner.len());
        sink.handle_endtag(&inner[..name_len].to_lowercase());
    }

    fn parse_starttag(&self, start: usize) -> Option<StartTag> {
        let bytes = self.input.as_bytes();
        let len = bytes.len();

        let name_start = start + 1;
        let mut i = name_start;
        while i < len && !matches!(bytes[i], b'\t' | b'\n' | b'\r' | b'\x0c' | b' ' | b'/' | b'>' | 0) {
            i += 1;
        }
        let name = self.input[name_start..i].to_lowercase();
        let mut attrs = Vec::new();

        loop {
            // Only a separator `/` directly before `>` closes the tag; a `/`
            // ending an unquoted value belongs to the value.
            let mut slash_before_close = false;
            while i < len && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
                slash_before_close = bytes[i] == b'/';
                i += 1;
            }
            if i >= len {
                return None;
            }
            if bytes[i] == b'>' {
                return Some(StartTag {
                    name,
                    attrs,
                    self_closing: slash_before_close,
                    end: i + 1,
                });
            }

            // The first name character may be anything but a separator,
            // which guarantees progress on input like `<a =x>`.
            let attr_start = i;
            i += 1;
            while i < len && !(bytes[i].is_ascii_whitespace() || matches!(bytes[i], b'/' | b'=' | b'>')) {
                i += 1;
            }
            let attr_name = self.input[attr_start..i].to_lowercase();

            let mut j = i;
            while j < len && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= len || bytes[j] != b'=' {
                attrs.push((attr_name, String::new()));
                continue;
            }
            while j < len && bytes[j] == b'=' {
                j += 1;
            }
            while j < len && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= len {
                return None;
            }

            let raw_value = match bytes[j] {
                quote @ (b'"' | b'\'') => {
                    let close = self.input[j + 1..].find(quote as char)?;
                    let value = &self.input[j + 1..j + 1 + close];
                    i = j + close + 2;
                    value
                }
                _ => {
                    let value_start = j;
                    while j < len && !(bytes[j].is_ascii_whitespace() || bytes[j] == b'>') {
                        j += 1;
                    }
                    i = j;
                    &self.input[value_start..j]
                }
            };
            attrs.push((attr_name, entities::unescape(raw_value).into_owned()));
        }
    }

    fn raw_text<S: TokenSink>(&mut self, tag: &str, sink: &mut S) {
        let rest = &self.input[self.pos..];
        match raw_text_end_regex(tag).find(rest) {
            Some(m) => {
                if m.start() > 0 {
                    sink.handle_rawtext(tag, &rest[..m.start()]);
                }
                sink.handle_endtag(tag);
                self.pos += m.end();
            }
            None => {
                if !rest.is_empty() {
                    sink.handle_rawtext(tag, rest);
                }
                self.pos = self.input.len();
            }
        }
    }

    fn reference<S: TokenSink>(&mut self, sink: &mut S) {
        let rest = &self.input[self.pos..];

        let is_charref = rest.starts_with("&#");
        let regex = if is_charref {
            charref_regex()
        } else {
            entityref_regex()
        };
        let body_is_terminated = |b: u8| {
            if is_charref {
                !b.is_ascii_hexdigit()
            } else {
                !b.is_ascii_alphanumeric()
            }
        };

        let Some(caps) = regex.captures(rest) else {
            sink.handle_data("&");
            self.pos += 1;
            return;
        };
        let whole = caps.get(0).map_or(0, |m| m.end());
        let name = caps.get(1).map_or("", |m| m.as_str());

        match rest.as_bytes().get(whole).copied() {
            // A reference running into the end of input is not complete.
            None => self.rest_as_data(sink),
            Some(b) if body_is_terminated(b) => {
                if is_charref {
                    sink.handle_charref(name);
                } else {
                    sink.handle_entityref(name);
                }
                self.pos += if b == b';' { whole + 1 } else { whole };
            }
            Some(_) => {
                sink.handle_data("&");
                self.pos += 1;
            }
        }
    }
}
