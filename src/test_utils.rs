//! Shared test doubles and proptest strategies.

use std::cell::Cell;

use proptest::prelude::*;

use crate::error::QueryError;
use crate::policy::HtmlPolicy;
use crate::query::{Cursor, Query, QueryRun, SortOrder};

/// A query over `total` synthetic records that counts how often it runs.
#[derive(Debug, Default)]
pub(crate) struct SpyQuery {
    total: usize,
    filters: Vec<(String, String)>,
    orders: Vec<(String, SortOrder)>,
    limit: Option<usize>,
    fail_after: Option<usize>,
    runs: Cell<usize>,
    last_limit: Cell<Option<usize>>,
}

impl SpyQuery {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub(crate) fn filter(mut self, field: &str, value: &str) -> Self {
        self.filters.push((field.to_string(), value.to_string()));
        self
    }

    pub(crate) fn order(mut self, field: &str, order: SortOrder) -> Self {
        self.orders.push((field.to_string(), order));
        self
    }

    pub(crate) fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Makes every run fail after yielding `count` results.
    pub(crate) fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.get()
    }

    pub(crate) fn last_limit(&self) -> Option<usize> {
        self.last_limit.get()
    }
}

impl Query for SpyQuery {
    fn filters(&self) -> Vec<(String, String)> {
        self.filters.clone()
    }

    fn orders(&self) -> Vec<(String, SortOrder)> {
        self.orders.clone()
    }

    fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn run_keys_only(&self, limit: usize) -> Result<Box<dyn QueryRun + '_>, QueryError> {
        self.runs.set(self.runs.get() + 1);
        self.last_limit.set(Some(limit));
        Ok(Box::new(SpyRun {
            remaining: self.total.min(limit),
            fail_after: self.fail_after,
            position: 0,
        }))
    }
}

struct SpyRun {
    remaining: usize,
    fail_after: Option<usize>,
    position: usize,
}

impl Iterator for SpyRun {
    type Item = Result<String, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fail_after == Some(self.position) {
            return Some(Err(QueryError::new("backend failure")));
        }
        if self.position == self.remaining {
            return None;
        }
        self.position += 1;
        Some(Ok(format!("key-{}", self.position)))
    }
}

impl QueryRun for SpyRun {
    fn cursor(&self) -> Cursor {
        Cursor::new(format!("cursor-{}", self.position))
    }
}

/// Markup fragments mixing allowed and hostile constructs.
fn arb_fragment() -> impl Strategy<Value = String> {
    let tag = prop::sample::select(vec![
        "b", "i", "p", "span", "a", "img", "br", "div", "script", "iframe", "object", "svg",
    ]);
    let attr = prop::sample::select(vec![
        "",
        r#" href="/x""#,
        r#" href="javascript:x""#,
        " onclick=\"y\"",
        " onerror=z",
        r#" title="t""#,
        r#" class="viur-txt-a evil""#,
        r#" style="color: red; position: fixed""#,
        r#" src="/i.png""#,
        " target=_blank",
    ]);

    prop_oneof![
        prop::string::string_regex("[0-9 ]{0,5}").unwrap(),
        (tag.clone(), attr).prop_map(|(tag, attr)| format!("<{}{}>", tag, attr)),
        tag.prop_map(|tag| format!("</{}>", tag)),
        Just("&amp;".to_string()),
        Just("&#60;".to_string()),
        Just("<".to_string()),
        Just("<!-- c -->".to_string()),
    ]
}

/// Arbitrary markup built from [`arb_fragment`]s.
pub(crate) fn arb_markup() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..24).prop_map(|parts| parts.concat())
}

/// Checks that every non-void element in `html` is closed in LIFO order.
///
/// Assumes attribute values contain no `>`.
pub(crate) fn is_well_formed(html: &str, policy: &HtmlPolicy) -> bool {
    let mut stack: Vec<&str> = Vec::new();
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            return false;
        };
        let inner = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        if let Some(name) = inner.strip_prefix('/') {
            if stack.pop() != Some(name) {
                return false;
            }
        } else {
            let name = inner.split(' ').next().unwrap_or_default();
            if !policy.is_single_tag(name) {
                stack.push(name);
            }
        }
    }

    stack.is_empty()
}
