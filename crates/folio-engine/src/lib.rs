//! Template engine for Folio.
//!
//! [`TemplateEngine`] is the contract the page renderer drives: variables are
//! assigned one at a time, then a template is fetched under a cache id.
//! Rendered output can be cached per cache id, queried and cleared.
//!
//! [`MiniJinjaEngine`] implements it on top of `minijinja`, with two
//! [`CacheBucket`](folio_cache::CacheBucket)s:
//!
//! - an output cache holding rendered fragments with a lifetime
//! - a compile store holding template sources validated by mtime
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use std::time::Duration;
//! use folio_cache::{Cache, FileCache};
//! use folio_engine::{Caching, MiniJinjaEngine, TemplateEngine};
//!
//! let cache = FileCache::new(".folio/cache/result".into(), "0.1.0");
//! let mut engine = MiniJinjaEngine::new(Path::new("pages"))?
//!     .caching(Caching::Lifetime(Duration::from_secs(600)))
//!     .with_cache(cache.bucket("fragments"));
//!
//! engine.assign("title", "Home".into());
//! let html = engine.fetch("layout.html", "home/content.html")?;
//! # Ok(())
//! # }
//! ```

mod jinja;
mod key;
mod loader;

use std::time::Duration;

pub use crate::jinja::MiniJinjaEngine;
pub use crate::key::FragmentKey;

/// Lifetime applied to cached output unless configured otherwise.
pub const DEFAULT_CACHE_LIFETIME: Duration = Duration::from_secs(3600);

/// Output caching mode of an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Caching {
    /// Every fetch renders.
    Disabled,
    /// Rendered output is reused until it is older than the lifetime.
    Lifetime(Duration),
}

impl Default for Caching {
    fn default() -> Self {
        Self::Lifetime(DEFAULT_CACHE_LIFETIME)
    }
}

/// Template engine driven by the page renderer.
///
/// Any engine honoring these semantics can stand in for [`MiniJinjaEngine`].
pub trait TemplateEngine: Send {
    /// Whether a live cached fragment exists for `cache_id`.
    fn is_cached(&self, cache_id: &str) -> bool;

    /// Drop the cached fragment for `cache_id`.
    fn clear_cache(&self, cache_id: &str);

    /// Bind `value` to `name` for the next [`fetch`](Self::fetch),
    /// replacing any earlier binding of the same name.
    fn assign(&mut self, name: &str, value: serde_json::Value);

    /// Like [`assign`](Self::assign), but the text is trusted markup and
    /// is printed without auto-escaping.
    ///
    /// Engines without escaping can rely on the default, a plain string
    /// binding.
    fn assign_safe(&mut self, name: &str, value: String) {
        self.assign(name, serde_json::Value::String(value));
    }

    /// Render `template` with the assigned variables, or return the cached
    /// fragment for `cache_id` when it was produced from identical inputs.
    ///
    /// Assigned variables are consumed: the next fetch starts empty.
    fn fetch(&mut self, template: &str, cache_id: &str) -> Result<String, EngineError>;
}

/// Error returned by a [`TemplateEngine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The template, or one it includes, does not exist under the root.
    #[error("Template not found: {0}")]
    NotFound(String),
    /// The engine failed to load, compile or render the template.
    #[error("Failed to render {template}: {source}")]
    Render {
        /// Template passed to `fetch`.
        template: String,
        /// Engine-specific failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
