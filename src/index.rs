//! Stable page indexes for cursor-based pagination.
//!
//! Cursor-based stores can resume "after the current position" but cannot
//! jump to page *n*. [`IndexManager`] walks a query once, records the resume
//! cursor at every page boundary and caches that list, so later requests for
//! any page cost a single lookup.
//!
//! # Bounded query sets
//!
//! Indexes are keyed by a hash of the query's filters, sort clauses and
//! limit. The caller must keep the number of distinct queries bounded: if an
//! untrusted client can vary filters freely, it can force an unbounded number
//! of index builds, each executing up to `page_size * max_pages` results.
//!
//! Indexes are never refreshed automatically. Whenever a write affects a
//! query's results, call [`IndexManager::refresh_index`] for that query.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::{CacheEntry, TieredCache};
use crate::error::IndexError;
use crate::query::{Cursor, Query};
use crate::store::KeyValueStore;

/// Store kind that page indexes are persisted under by default.
pub const DEFAULT_INDEX_KIND: &str = "viur_indexes";

/// Resume cursors, one per page. Slot 0 is always `None`; slot *i* resumes
/// at the first item of page *i*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageIndex(Vec<Option<Cursor>>);

impl PageIndex {
    /// Number of reachable pages (at least 1).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: the first page exists even without results.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The resume cursor for `page`, or `None` for page 0 and out-of-range pages.
    pub fn cursor(&self, page: usize) -> Option<&Cursor> {
        if page == 0 {
            return None;
        }
        self.0.get(page).and_then(Option::as_ref)
    }

    /// All slots in page order.
    pub fn as_slice(&self) -> &[Option<Cursor>] {
        &self.0
    }
}

/// Persisted form of a [`PageIndex`].
pub type IndexCacheEntry = CacheEntry<PageIndex>;

/// Sizing of page indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Items per page
    pub page_size: usize,
    /// Pages indexed. Items past `page_size * max_pages` cannot be reached
    /// through the index.
    pub max_pages: usize,
}

impl IndexConfig {
    /// Creates a configuration.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` or `max_pages` is 0.
    pub fn new(page_size: usize, max_pages: usize) -> Self {
        assert!(page_size > 0, "page_size must be greater than 0");
        assert!(max_pages > 0, "max_pages must be greater than 0");
        Self {
            page_size,
            max_pages,
        }
    }

    /// Results examined when building an index.
    pub fn scan_limit(&self) -> usize {
        self.page_size.saturating_mul(self.max_pages)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(10, 100)
    }
}

/// Builds, caches and serves page indexes for a bounded set of queries.
///
/// # Examples
///
/// ```
/// use content_core::{IndexConfig, IndexManager, MemoryStore};
///
/// let store = MemoryStore::new();
/// let manager = IndexManager::new(&store, IndexConfig::new(10, 100));
/// assert_eq!(manager.config().page_size, 10);
/// ```
#[derive(Debug)]
pub struct IndexManager<S> {
    config: IndexConfig,
    cache: TieredCache<S, PageIndex>,
}

impl<S: KeyValueStore> IndexManager<S> {
    /// Creates a manager persisting indexes under [`DEFAULT_INDEX_KIND`].
    pub fn new(store: S, config: IndexConfig) -> Self {
        Self::with_kind(store, config, DEFAULT_INDEX_KIND)
    }

    /// Creates a manager persisting indexes under a custom store kind.
    ///
    /// # Panics
    ///
    /// Panics if `config` has a zero page size or page count, which can only
    /// happen when it was deserialized rather than built with
    /// [`IndexConfig::new`].
    pub fn with_kind(store: S, config: IndexConfig, kind: impl Into<String>) -> Self {
        Self {
            config: IndexConfig::new(config.page_size, config.max_pages),
            cache: TieredCache::new(store, kind),
        }
    }

    /// Returns the sizing configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Derives the cache key for `query`: a SHA-256 hex digest over its
    /// filters, sort clauses and (if limited) the page size, independent of
    /// the order in which filters were applied.
    pub fn key_from_query<Q: Query + ?Sized>(&self, query: &Q) -> String {
        let mut parts = query.filters();
        parts.extend(
            query
                .orders()
                .into_iter()
                .map(|(field, order)| (format!("__{} =", field), order.to_string())),
        );
        if query.limit().is_some() {
            parts.push(("__pagesize =".to_string(), self.config.page_size.to_string()));
        }
        parts.sort();

        let mut hasher = Sha256::new();
        for (field, value) in &parts {
            hasher.update(field.as_bytes());
            hasher.update(value.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Returns the page index for `query`, building and persisting it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Query failures during a build propagate and nothing is cached. Store
    /// failures other than a missing record propagate as well.
    pub fn get_or_build_index<Q: Query + ?Sized>(&self, query: &Q) -> Result<PageIndex, IndexError> {
        let key = self.key_from_query(query);
        if let Some(index) = self.cache.get(&key)? {
            return Ok(index);
        }

        tracing::debug!(key = %key, limit = self.config.scan_limit(), "building page index");
        let index = self.build_index(query)?;
        self.cache.put(&key, index.clone())?;
        tracing::debug!(key = %key, pages = index.len(), "page index built");
        Ok(index)
    }

    fn build_index<Q: Query + ?Sized>(&self, query: &Q) -> Result<PageIndex, IndexError> {
        let page_size = self.config.page_size;
        let mut run = query.run_keys_only(self.config.scan_limit())?;

        let mut slots = Vec::new();
        let mut previous: Option<Cursor> = None;
        let mut counter = 0usize;
        while let Some(item) = run.next() {
            item?;
            if counter % page_size == 0 {
                slots.push(previous.clone());
            }
            if counter % page_size == page_size - 1 {
                previous = Some(run.cursor());
            }
            counter += 1;
        }

        if slots.is_empty() {
            slots.push(None);
        }
        Ok(PageIndex(slots))
    }

    /// Returns the resume cursor for `page` of `query`.
    ///
    /// Page 0 and pages outside the index yield `None`, which callers treat
    /// as "start from the beginning".
    ///
    /// # Errors
    ///
    /// See [`get_or_build_index`](Self::get_or_build_index).
    pub fn cursor_for_query<Q: Query + ?Sized>(&self, query: &Q, page: i64) -> Result<Option<Cursor>, IndexError> {
        let index = self.get_or_build_index(query)?;
        Ok(usize::try_from(page)
            .ok()
            .and_then(|page| index.cursor(page))
            .cloned())
    }

    /// Like [`cursor_for_query`](Self::cursor_for_query) for a raw request
    /// parameter. Anything that is not an integer yields `None` without
    /// touching the index.
    ///
    /// # Errors
    ///
    /// See [`get_or_build_index`](Self::get_or_build_index).
    pub fn cursor_for_page_param<Q: Query + ?Sized>(
        &self,
        query: &Q,
        page: &str,
    ) -> Result<Option<Cursor>, IndexError> {
        match page.trim().parse::<i64>() {
            Ok(page) => self.cursor_for_query(query, page),
            Err(_) => {
                tracing::debug!("ignoring non-numeric page parameter");
                Ok(None)
            }
        }
    }

    /// Returns every page's start cursor, e.g. to render page links.
    ///
    /// # Errors
    ///
    /// See [`get_or_build_index`](Self::get_or_build_index).
    pub fn get_pages<Q: Query + ?Sized>(&self, query: &Q) -> Result<PageIndex, IndexError> {
        self.get_or_build_index(query)
    }

    /// Drops the index for `query` from memory and the store; the next
    /// access rebuilds it.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Store`] if the store fails to delete for a reason
    /// other than the entry not existing.
    pub fn refresh_index<Q: Query + ?Sized>(&self, query: &Q) -> Result<(), IndexError> {
        let key = self.key_from_query(query);
        tracing::debug!(key = %key, "refreshing page index");
        self.cache.evict(&key)
    }
}
