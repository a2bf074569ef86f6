use std::fmt;

use crate::text::Translations;

/// Error returned when a sanitizer policy has an unrecognized shape.
///
/// This is a caller contract violation: sanitizing itself never fails.
///
/// # Examples
///
/// ```
/// use content_core::{PolicyError, PolicyErrorKind};
///
/// let error = PolicyError::new(PolicyErrorKind::Malformed, "expected a list");
/// assert_eq!(error.kind(), PolicyErrorKind::Malformed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyError {
    kind: PolicyErrorKind,
    message: String,
}

impl PolicyError {
    /// Creates a new policy error.
    pub fn new(kind: PolicyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> PolicyErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid policy ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for PolicyError {}

/// Kind of policy error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorKind {
    /// The policy document does not match the expected shape.
    Malformed,
    /// A class pattern can never match a valid class token.
    InvalidClassPattern,
}

impl fmt::Display for PolicyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed policy"),
            Self::InvalidClassPattern => write!(f, "invalid class pattern"),
        }
    }
}

/// Error returned by a [`KeyValueStore`](crate::KeyValueStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    kind: StoreErrorKind,
    message: Option<String>,
}

impl StoreError {
    /// Creates a new store error with the specified kind.
    pub fn new(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a new store error with a custom message.
    pub fn with_message(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    /// Shorthand for a [`StoreErrorKind::NotFound`] error.
    pub fn not_found() -> Self {
        Self::new(StoreErrorKind::NotFound)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns `true` if the record did not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(msg) = &self.message {
            write!(f, "store error ({}): {}", self.kind, msg)
        } else {
            write!(f, "store error ({})", self.kind)
        }
    }
}

impl std::error::Error for StoreError {}

/// Kind of store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// No record exists under the requested key.
    NotFound,
    /// The backing store failed.
    Backend,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Backend => write!(f, "backend failure"),
        }
    }
}

/// Error raised by a query backend while executing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    /// Creates a new query error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query failed: {}", self.message)
    }
}

impl std::error::Error for QueryError {}

/// Errors surfaced by the [`IndexManager`](crate::IndexManager).
///
/// A missing persisted entry is never reported; it is a cache miss.
#[derive(Debug)]
pub enum IndexError {
    /// Executing the query while building an index failed.
    Query(QueryError),
    /// The backing store failed for a reason other than a missing record.
    Store(StoreError),
    /// An index could not be encoded for persistence.
    Serialization(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Query(e) => write!(f, "index build failed: {}", e),
            IndexError::Store(e) => write!(f, "index persistence failed: {}", e),
            IndexError::Serialization(msg) => write!(f, "index serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IndexError::Query(e) => Some(e),
            IndexError::Store(e) => Some(e),
            IndexError::Serialization(_) => None,
        }
    }
}

impl From<QueryError> for IndexError {
    fn from(e: QueryError) -> Self {
        IndexError::Query(e)
    }
}

impl From<StoreError> for IndexError {
    fn from(e: StoreError) -> Self {
        IndexError::Store(e)
    }
}

/// Validation failure for a value submitted to a [`TextField`](crate::TextField).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// No value (or an empty value) was submitted.
    NoValue,
    /// The value exceeds the field's maximum length in characters.
    TooLong {
        /// The configured maximum
        max: usize,
    },
    /// None of the configured languages received a usable value.
    NoValidTranslations,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::NoValue => write!(f, "No value entered"),
            FieldError::TooLong { max } => write!(f, "Maximum length of {} exceeded", max),
            FieldError::NoValidTranslations => write!(f, "No / invalid values entered"),
        }
    }
}

impl std::error::Error for FieldError {}

/// Rejection of a translated submission.
///
/// Carries the translations that did pass validation, already sanitized, so
/// a form can be redisplayed without losing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationsError {
    error: FieldError,
    accepted: Translations,
}

impl TranslationsError {
    /// Creates a new translations error.
    pub fn new(error: FieldError, accepted: Translations) -> Self {
        Self { error, accepted }
    }

    /// Returns the last validation failure.
    pub fn error(&self) -> &FieldError {
        &self.error
    }

    /// Returns the translations that passed validation.
    pub fn accepted(&self) -> &Translations {
        &self.accepted
    }

    /// Consumes the error, returning the translations that passed validation.
    pub fn into_accepted(self) -> Translations {
        self.accepted
    }
}

impl fmt::Display for TranslationsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for TranslationsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_display() {
        let error = PolicyError::new(PolicyErrorKind::InvalidClassPattern, "a*b");
        let output = format!("{}", error);
        assert!(output.contains("invalid policy"));
        assert!(output.contains("invalid class pattern"));
        assert!(output.contains("a*b"));
    }

    #[test]
    fn store_error_not_found() {
        let error = StoreError::not_found();
        assert!(error.is_not_found());
        assert_eq!(error.message(), None);
        assert_eq!(format!("{}", error), "store error (not found)");

        let error = StoreError::with_message(StoreErrorKind::Backend, "timeout");
        assert!(!error.is_not_found());
        assert_eq!(format!("{}", error), "store error (backend failure): timeout");
    }

    #[test]
    fn index_error_wraps_sources() {
        let error: IndexError = QueryError::new("deadline exceeded").into();
        assert!(matches!(error, IndexError::Query(_)));
        assert!(format!("{}", error).contains("deadline exceeded"));
        assert!(std::error::Error::source(&error).is_some());

        let error: IndexError = StoreError::new(StoreErrorKind::Backend).into();
        assert!(matches!(error, IndexError::Store(_)));
    }

    #[test]
    fn field_error_messages() {
        assert_eq!(FieldError::NoValue.to_string(), "No value entered");
        assert_eq!(
            FieldError::TooLong { max: 10 }.to_string(),
            "Maximum length of 10 exceeded"
        );
        assert_eq!(
            FieldError::NoValidTranslations.to_string(),
            "No / invalid values entered"
        );
    }

    #[test]
    fn translations_error_keeps_accepted_values() {
        let accepted = Translations::from([("en".to_string(), "ok".to_string())]);
        let error = TranslationsError::new(FieldError::TooLong { max: 5 }, accepted.clone());

        assert_eq!(error.error(), &FieldError::TooLong { max: 5 });
        assert_eq!(error.to_string(), "Maximum length of 5 exceeded");
        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(error.into_accepted(), accepted);
    }
}
