//! Content handling core for rich-text fields and paginated listings.
//!
//! This crate provides two independent building blocks:
//! - **Sanitization**: an allow-list HTML sanitizer that reduces untrusted
//!   markup to well-formed output containing only what an [`HtmlPolicy`]
//!   permits
//! - **Page indexes**: an [`IndexManager`] that turns cursor-only queries
//!   into random-access pagination by caching one resume cursor per page
//!
//! # Core Types
//!
//! - [`HtmlPolicy`]: Allow-list of tags, attributes, styles and classes
//! - [`HtmlSanitizer`]: Applies a policy to an HTML fragment
//! - [`TextField`]: Validation and sanitization of submitted rich text
//! - [`IndexManager`]: Builds, caches and serves page indexes
//! - [`Query`] / [`KeyValueStore`]: Seams to the host datastore
//!
//! # Examples
//!
//! ```
//! use content_core::{HtmlPolicy, HtmlSanitizer};
//!
//! let policy = HtmlPolicy::rich_text();
//! let sanitizer = HtmlSanitizer::new(&policy);
//!
//! assert_eq!(
//!     sanitizer.sanitize(r#"<p onclick="steal()">Hello <b>world</p>"#),
//!     "<p>Hello <b>world</b></p>"
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod entities;
mod error;
mod index;
mod policy;
mod query;
mod sanitizer;
mod store;
mod text;
mod tokenizer;

#[cfg(test)]
mod test_utils;

pub use cache::{CacheEntry, TieredCache};
pub use entities::is_known_entity;
pub use error::{
    FieldError, IndexError, PolicyError, PolicyErrorKind, QueryError, StoreError, StoreErrorKind,
    TranslationsError,
};
pub use index::{IndexCacheEntry, IndexConfig, IndexManager, PageIndex, DEFAULT_INDEX_KIND};
pub use policy::HtmlPolicy;
pub use query::{Cursor, Query, QueryRun, SortOrder};
pub use sanitizer::HtmlSanitizer;
pub use store::{KeyValueStore, MemoryStore, Record};
pub use text::{TextField, Translations, DEFAULT_MAX_LENGTH, DEFAULT_SEARCH_CHARS};
