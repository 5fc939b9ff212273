//! Typed helpers on top of [`CacheBucket`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheBucket;

/// JSON and UTF-8 accessors for any [`CacheBucket`].
///
/// Kept on an extension trait so [`CacheBucket`] stays object-safe and
/// byte-oriented.
///
/// ```
/// use folio_cache::{Cache, CacheBucketExt, NullCache};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Fragment { html: String }
///
/// let bucket = NullCache.bucket("fragments");
/// bucket.set_json("home/content.html", "fp", &Fragment { html: "<p/>".into() });
/// let hit: Option<Fragment> = bucket.get_json("home/content.html", "fp");
/// assert!(hit.is_none());
/// ```
pub trait CacheBucketExt: CacheBucket {
    /// Deserialize a JSON entry. Misses, etag mismatches and undecodable
    /// entries all yield `None`.
    fn get_json<T: DeserializeOwned>(&self, key: &str, etag: &str) -> Option<T> {
        let bytes = self.get(key, etag)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Serialize `value` as JSON. Serialization failures are dropped.
    fn set_json<T: Serialize>(&self, key: &str, etag: &str, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set(key, etag, &bytes);
        }
    }

    /// Retrieve a UTF-8 entry.
    fn get_string(&self, key: &str, etag: &str) -> Option<String> {
        String::from_utf8(self.get(key, etag)?).ok()
    }

    /// Store a UTF-8 entry.
    fn set_string(&self, key: &str, etag: &str, value: &str) {
        self.set(key, etag, value.as_bytes());
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}
