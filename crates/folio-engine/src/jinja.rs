//! `minijinja`-backed [`TemplateEngine`].

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use folio_cache::{CacheBucket, CacheBucketExt, NullCacheBucket};
use minijinja::{Environment, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::key::root_scope;
use crate::loader::TemplateSources;
use crate::{Caching, EngineError, FragmentKey, TemplateEngine};

/// Template engine rendering `minijinja` templates from a root directory.
///
/// Template names are `/`-separated paths relative to the root. HTML
/// auto-escaping applies to `.html` templates, except for values bound
/// with [`assign_safe`](TemplateEngine::assign_safe).
///
/// Built with caching enabled at the default lifetime but with no-op
/// storage; attach buckets with [`with_cache`](Self::with_cache) and
/// [`with_compile_cache`](Self::with_compile_cache).
pub struct MiniJinjaEngine {
    env: Environment<'static>,
    root: PathBuf,
    scope: String,
    caching: Caching,
    fragments: Box<dyn CacheBucket>,
    assigns: BTreeMap<String, Binding>,
}

/// An assigned variable.
#[derive(Serialize)]
enum Binding {
    Value(serde_json::Value),
    Safe(String),
}

impl Binding {
    fn to_value(&self) -> minijinja::Value {
        match self {
            Self::Value(v) => minijinja::Value::from_serialize(v),
            Self::Safe(s) => minijinja::Value::from_safe_string(s.clone()),
        }
    }
}

impl MiniJinjaEngine {
    /// Create an engine loading templates from `template_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `template_root` cannot be canonicalized.
    pub fn new(template_root: &Path) -> io::Result<Self> {
        let root = template_root.canonicalize()?;
        let mut env = Environment::new();
        install_loader(&mut env, &root, Arc::new(NullCacheBucket));
        Ok(Self {
            env,
            scope: root_scope(&root),
            root,
            caching: Caching::default(),
            fragments: Box::new(NullCacheBucket),
            assigns: BTreeMap::new(),
        })
    }

    /// Set the output caching mode.
    #[must_use]
    pub fn caching(mut self, caching: Caching) -> Self {
        self.caching = caching;
        self
    }

    /// Store rendered fragments in `bucket`.
    #[must_use]
    pub fn with_cache(mut self, bucket: Box<dyn CacheBucket>) -> Self {
        self.fragments = bucket;
        self
    }

    /// Load template sources through `bucket`.
    #[must_use]
    pub fn with_compile_cache(mut self, bucket: Box<dyn CacheBucket>) -> Self {
        install_loader(&mut self.env, &self.root, Arc::from(bucket));
        self
    }

    /// Canonical template root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn render(
        &mut self,
        template: &str,
        bindings: &BTreeMap<String, Binding>,
    ) -> Result<String, EngineError> {
        // Reload through the compile store so edited sources are picked up
        self.env.clear_templates();
        let tmpl = self
            .env
            .get_template(template)
            .map_err(|e| convert_error(template, e))?;
        let ctx: minijinja::Value = bindings
            .iter()
            .map(|(name, binding)| (name.as_str(), binding.to_value()))
            .collect();
        tmpl.render(ctx).map_err(|e| convert_error(template, e))
    }

    /// Bucket key for `cache_id`, scoped to this engine's root.
    fn entry_key(&self, cache_id: &str) -> String {
        format!("{}/{cache_id}", self.scope)
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn is_cached(&self, cache_id: &str) -> bool {
        let Caching::Lifetime(lifetime) = self.caching else {
            return false;
        };
        self.fragments
            .get_json::<CachedFragment>(&self.entry_key(cache_id), "")
            .is_some_and(|entry| entry.is_fresh(lifetime))
    }

    fn clear_cache(&self, cache_id: &str) {
        self.fragments.remove(&self.entry_key(cache_id));
    }

    fn assign(&mut self, name: &str, value: serde_json::Value) {
        self.assigns.insert(name.to_owned(), Binding::Value(value));
    }

    fn assign_safe(&mut self, name: &str, value: String) {
        self.assigns.insert(name.to_owned(), Binding::Safe(value));
    }

    fn fetch(&mut self, template: &str, cache_id: &str) -> Result<String, EngineError> {
        let bindings = std::mem::take(&mut self.assigns);

        let Caching::Lifetime(lifetime) = self.caching else {
            return self.render(template, &bindings);
        };

        let key = self.entry_key(cache_id);
        let fingerprint = FragmentKey {
            root: &self.root,
            template,
            bindings: &bindings,
        }
        .compute_hash();

        if let Some(entry) = self
            .fragments
            .get_json::<CachedFragment>(&key, &fingerprint)
            && entry.is_fresh(lifetime)
        {
            tracing::debug!(template, cache_id, "Fragment cache hit");
            return Ok(entry.html);
        }

        let html = self.render(template, &bindings)?;
        self.fragments.set_json(
            &key,
            &fingerprint,
            &CachedFragmentRef {
                html: &html,
                created_at: unix_now(),
            },
        );
        tracing::debug!(template, cache_id, "Fragment rendered and cached");
        Ok(html)
    }
}

fn install_loader(env: &mut Environment<'static>, root: &Path, store: Arc<dyn CacheBucket>) {
    let sources = TemplateSources::new(root.to_path_buf(), store);
    env.set_loader(move |name| sources.load(name));
}

fn convert_error(template: &str, err: minijinja::Error) -> EngineError {
    if err.kind() == ErrorKind::TemplateNotFound {
        // The detail names the missing template, which may be an include
        let detail = err
            .detail()
            .map_or_else(|| format!("template {template:?} does not exist"), str::to_owned);
        return EngineError::NotFound(detail);
    }
    EngineError::Render {
        template: template.to_owned(),
        source: Box::new(err),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Cached fragment (owned, for reads).
#[derive(Deserialize)]
struct CachedFragment {
    html: String,
    created_at: u64,
}

impl CachedFragment {
    fn is_fresh(&self, lifetime: Duration) -> bool {
        Duration::from_secs(unix_now().saturating_sub(self.created_at)) < lifetime
    }
}

/// Borrowed view of a fragment for writes.
#[derive(Serialize)]
struct CachedFragmentRef<'a> {
    html: &'a str,
    created_at: u64,
}
