use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// An opaque resume token marking a position in an ordered result stream.
///
/// Cursors are produced by a [`QueryRun`] and handed back to the query
/// backend to continue after that position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a backend-specific resume token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a sort clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "asc"),
            SortOrder::Descending => write!(f, "desc"),
        }
    }
}

/// A query supplied by the host datastore layer.
///
/// The index manager only needs to describe a query (for its cache key) and
/// to walk its results once while capturing resume cursors.
pub trait Query {
    /// Filter clauses as `(field and operator, value)` pairs, e.g.
    /// `("author =", "42")`. Order does not matter.
    fn filters(&self) -> Vec<(String, String)>;

    /// Sort clauses in precedence order.
    fn orders(&self) -> Vec<(String, SortOrder)>;

    /// The result-count limit carried by the query, if any.
    fn limit(&self) -> Option<usize>;

    /// Starts a keys-only run returning at most `limit` results.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if the backend cannot execute the query.
    fn run_keys_only(&self, limit: usize) -> Result<Box<dyn QueryRun + '_>, QueryError>;
}

/// A single pass over query results.
///
/// Each item is the key of a matching record. After an item has been
/// yielded, [`cursor`](QueryRun::cursor) points immediately behind it.
pub trait QueryRun: Iterator<Item = Result<String, QueryError>> {
    /// The resume cursor for the current position.
    fn cursor(&self) -> Cursor;
}
