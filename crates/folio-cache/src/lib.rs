//! Cache abstraction layer for Folio.
//!
//! Rendered page fragments and compiled template sources are both stored
//! through the same two traits:
//!
//! - [`Cache`]: Factory for named cache buckets
//! - [`CacheBucket`]: Key-value store with etag validation and removal
//!
//! # Implementations
//!
//! - [`NullCache`] / [`NullCacheBucket`]: Caching disabled (always miss)
//! - [`FileCache`]: One file per entry under a versioned root directory
//!
//! # Example
//!
//! ```
//! use folio_cache::{Cache, NullCache};
//!
//! let cache = NullCache;
//! let bucket = cache.bucket("fragments");
//! bucket.set("home/content.html", "abc123", b"<main>hello</main>");
//! assert_eq!(bucket.get("home/content.html", "abc123"), None);
//! ```

mod ext;
mod file;

pub use ext::CacheBucketExt;
pub use file::FileCache;

/// A named partition within a [`Cache`].
///
/// Values are validated by an etag chosen by the caller (a fingerprint of
/// the render inputs, a source mtime, ...). A hit requires both the key and
/// the etag to match.
pub trait CacheBucket: Send + Sync {
    /// Retrieve a cached value.
    ///
    /// Returns `None` on miss or etag mismatch. An empty `etag` skips
    /// validation and returns whatever is stored under `key`.
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any previous entry for `key`.
    fn set(&self, key: &str, etag: &str, value: &[u8]);

    /// Drop the entry for `key`. Missing entries are not an error.
    fn remove(&self, key: &str);
}

/// Factory for named [`CacheBucket`]s.
///
/// Buckets with different names never see each other's entries.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket (e.g. "fragments", "templates").
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// [`CacheBucket`] that stores nothing.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str, _etag: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _etag: &str, _value: &[u8]) {}

    fn remove(&self, _key: &str) {}
}

/// [`Cache`] used when caching is disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}
