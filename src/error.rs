use thiserror::Error;

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the cache API.
///
/// [`NotFound`](CacheError::NotFound) is ordinary control flow — a `get`
/// on an absent or already-expired key — and is never logged.
/// [`Destroyed`](CacheError::Destroyed) indicates a programmer error:
/// mutating a cache after [`destroy`](crate::RotatingCache::destroy).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The cache contains no entry for this key.
    #[error("cache contains no entry for this key")]
    NotFound,

    /// The cache has been destroyed and no longer accepts writes.
    #[error("cache is destroyed")]
    Destroyed,
}
