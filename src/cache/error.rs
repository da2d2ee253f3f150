use thiserror::Error;

/// Misuse of the resource cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The value cached at `key` is not of the requested type.
    #[error("cached value at '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// The fetch task for `key` panicked or was cancelled.
    #[error("fetch for '{key}' did not complete")]
    FetchAborted { key: String },
}
