//! Page rendering.
//!
//! [`PageRenderer`] resolves page paths to [`Page`]s and renders them by
//! feeding the layout template to a [`TemplateEngine`] together with the
//! manifest bindings, the caller's data and the computed bindings
//! (`js`, `bodyContent`, `rootURL`).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use folio_cache::{Cache, FileCache};
use folio_engine::{Caching, DEFAULT_CACHE_LIFETIME, EngineError, MiniJinjaEngine, TemplateEngine};

use crate::page::{self, DEFAULT_MANIFEST, Page, SCRIPT_FILENAME};

/// Error returned when page rendering fails.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The page root cannot be canonicalized.
    #[error("Page root {} is not accessible: {source}", path.display())]
    PageRoot {
        /// Configured page root.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The page does not resolve (or no longer resolves) under the root.
    #[error("Page not found: {0}")]
    NotFound(String),
    /// The page script exists but cannot be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Failure reported by the template engine.
    #[error(transparent)]
    Template(#[from] EngineError),
}

/// Configuration for [`PageRenderer`].
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Directory holding the layout and one directory per page.
    pub page_root: PathBuf,
    /// Base URL bound as `rootURL`.
    pub base_url: String,
    /// Directory for rendered fragments.
    ///
    /// If `None`, output caching is disabled.
    pub cache_dir: Option<PathBuf>,
    /// Directory for compiled template sources.
    ///
    /// If `None`, sources are read from disk on every render.
    pub compile_dir: Option<PathBuf>,
    /// Maximum age of a cached fragment.
    pub cache_lifetime: Duration,
    /// Manifest file name inside each page directory.
    pub manifest_name: String,
    /// Application version; caches written by another version are wiped.
    pub version: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            page_root: PathBuf::from("pages"),
            base_url: "/".to_owned(),
            cache_dir: None,
            compile_dir: None,
            cache_lifetime: DEFAULT_CACHE_LIFETIME,
            manifest_name: DEFAULT_MANIFEST.to_owned(),
            version: String::new(),
        }
    }
}

/// Resolves and renders pages under a page root.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::collections::HashMap;
/// use std::path::PathBuf;
/// use folio_site::{PageRenderer, RendererConfig};
///
/// let mut renderer = PageRenderer::new(RendererConfig {
///     page_root: PathBuf::from("pages"),
///     cache_dir: Some(PathBuf::from(".folio/cache/result")),
///     ..RendererConfig::default()
/// })?;
///
/// let Some(page) = renderer.resolve_page("home") else {
///     return Ok(()); // 404
/// };
/// let data = HashMap::from([("title".to_owned(), "Hi".into())]);
/// let html = renderer.render(&page, &data, false)?;
/// # Ok(())
/// # }
/// ```
pub struct PageRenderer {
    root: PathBuf,
    base_url: String,
    manifest_name: String,
    engine: Box<dyn TemplateEngine>,
}

impl PageRenderer {
    /// Create a renderer backed by [`MiniJinjaEngine`].
    ///
    /// # Errors
    ///
    /// Returns `RenderError::PageRoot` if the page root is not accessible.
    pub fn new(config: RendererConfig) -> Result<Self, RenderError> {
        let root = canonical_root(&config)?;

        let mut engine = MiniJinjaEngine::new(&root).map_err(|source| RenderError::PageRoot {
            path: config.page_root.clone(),
            source,
        })?;
        engine = match &config.cache_dir {
            Some(dir) => engine
                .caching(Caching::Lifetime(config.cache_lifetime))
                .with_cache(FileCache::new(dir.clone(), &config.version).bucket("fragments")),
            None => engine.caching(Caching::Disabled),
        };
        if let Some(dir) = &config.compile_dir {
            engine = engine
                .with_compile_cache(FileCache::new(dir.clone(), &config.version).bucket("templates"));
        }

        Ok(Self::from_parts(root, config, Box::new(engine)))
    }

    /// Create a renderer driving a custom engine.
    ///
    /// The cache settings of `config` are ignored; `engine` owns caching.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::PageRoot` if the page root is not accessible.
    pub fn with_engine(
        config: RendererConfig,
        engine: Box<dyn TemplateEngine>,
    ) -> Result<Self, RenderError> {
        let root = canonical_root(&config)?;
        Ok(Self::from_parts(root, config, engine))
    }

    fn from_parts(root: PathBuf, config: RendererConfig, engine: Box<dyn TemplateEngine>) -> Self {
        Self {
            root,
            base_url: config.base_url,
            manifest_name: config.manifest_name,
            engine,
        }
    }

    /// Resolve a page path.
    ///
    /// Returns `None` when the path escapes the page root, is not a
    /// directory, lacks a manifest or content template, or has a manifest
    /// that does not parse. Callers treat `None` as "page not found".
    pub fn resolve_page(&self, page_path: &str) -> Option<Page> {
        match page::resolve(&self.root, &self.manifest_name, page_path) {
            Ok(page) => {
                tracing::debug!(page = %page.name(), layout = %page.layout(), "Resolved page");
                Some(page)
            }
            Err(page::Unresolved::Manifest(e)) => {
                tracing::warn!(path = %page_path, error = %e, "Failed to parse page manifest");
                None
            }
            Err(reason) => {
                tracing::debug!(path = %page_path, %reason, "Page did not resolve");
                None
            }
        }
    }

    /// Render a resolved page.
    ///
    /// `data` is bound over the manifest bindings; `js`, `bodyContent` and
    /// `rootURL` are always bound last, as trusted text that templates print
    /// without escaping. With `force_reload`, or when the engine holds no
    /// live fragment for the page, the cached fragment is cleared first.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::NotFound` if the page no longer resolves,
    /// `RenderError::Io` if its script cannot be read, and
    /// `RenderError::Template` for engine failures.
    pub fn render(
        &mut self,
        page: &Page,
        data: &HashMap<String, serde_json::Value>,
        force_reload: bool,
    ) -> Result<String, RenderError> {
        if !page::still_valid(&self.root, page) {
            return Err(RenderError::NotFound(page.name().to_owned()));
        }

        let started = Instant::now();
        let content = page.content_template();

        if force_reload || !self.engine.is_cached(&content) {
            self.engine.clear_cache(&content);
        }

        for (name, value) in page.manifest().bindings() {
            self.engine.assign(name, value);
        }
        for (name, value) in data {
            self.engine.assign(name, value.clone());
        }
        self.engine.assign_safe("js", self.read_script(page)?);
        self.engine.assign_safe("bodyContent", content.clone());
        self.engine.assign_safe("rootURL", self.base_url.clone());

        let html = self.engine.fetch(page.layout(), &content)?;
        tracing::debug!(
            page = %page.name(),
            elapsed_ms = started.elapsed().as_millis(),
            "Rendered page"
        );
        Ok(html)
    }

    /// Resolve and render in one step.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::NotFound` if the path does not resolve, and any
    /// error of [`render`](Self::render).
    pub fn render_path(
        &mut self,
        page_path: &str,
        data: &HashMap<String, serde_json::Value>,
        force_reload: bool,
    ) -> Result<String, RenderError> {
        let page = self
            .resolve_page(page_path)
            .ok_or_else(|| RenderError::NotFound(page_path.to_owned()))?;
        self.render(&page, data, force_reload)
    }

    fn read_script(&self, page: &Page) -> Result<String, RenderError> {
        let path = page.dir().join(SCRIPT_FILENAME);
        match page::contained_file(&self.root, &path) {
            Some(script) => Ok(fs::read_to_string(script)?),
            None => {
                if path.exists() {
                    tracing::warn!(page = %page.name(), "Ignoring script outside the page root");
                }
                Ok(String::new())
            }
        }
    }
}

fn canonical_root(config: &RendererConfig) -> Result<PathBuf, RenderError> {
    config
        .page_root
        .canonicalize()
        .map_err(|source| RenderError::PageRoot {
            path: config.page_root.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::page::CONTENT_FILENAME;

    const LAYOUT: &str = "{{ title }}|{{ rootURL }}|{{ bodyContent }}|{{ js }}|{% include bodyContent %}";

    struct Site {
        tmp: TempDir,
        root: PathBuf,
    }

    impl Site {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().join("pages");
            fs::create_dir_all(&root).unwrap();
            fs::write(root.join("layout.html"), LAYOUT).unwrap();
            Self { tmp, root }
        }

        fn page(&self, name: &str, manifest: &str, content: &str) -> &Self {
            let dir = self.root.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(DEFAULT_MANIFEST), manifest).unwrap();
            fs::write(dir.join(CONTENT_FILENAME), content).unwrap();
            self
        }

        fn config(&self) -> RendererConfig {
            RendererConfig {
                page_root: self.root.clone(),
                base_url: "https://example.com/".to_owned(),
                ..RendererConfig::default()
            }
        }

        fn cached_config(&self) -> RendererConfig {
            RendererConfig {
                cache_dir: Some(self.tmp.path().join("cache/result")),
                compile_dir: Some(self.tmp.path().join("cache/compile")),
                version: "test".to_owned(),
                ..self.config()
            }
        }

        fn renderer(&self) -> PageRenderer {
            PageRenderer::new(self.config()).unwrap()
        }
    }

    fn data(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_new_fails_for_missing_root() {
        let config = RendererConfig {
            page_root: PathBuf::from("/definitely/not/here"),
            ..RendererConfig::default()
        };

        assert!(matches!(
            PageRenderer::new(config),
            Err(RenderError::PageRoot { .. })
        ));
    }

    #[test]
    fn test_render_home_example() {
        let site = Site::new();
        site.page("home", "", "<main>Welcome</main>");
        let mut renderer = site.renderer();

        let page = renderer.resolve_page("home").unwrap();
        let html = renderer
            .render(&page, &data(&[("title", json!("Hi"))]), false)
            .unwrap();

        assert_eq!(
            html,
            "Hi|https://example.com/|home/content.html||<main>Welcome</main>"
        );
    }

    #[test]
    fn test_script_is_bound_as_js() {
        let site = Site::new();
        site.page("home", "", "body");
        fs::write(site.root.join("home/script.js"), "console.log('<hi>');").unwrap();
        let mut renderer = site.renderer();

        let html = renderer.render_path("home", &HashMap::new(), false).unwrap();

        assert!(html.contains("|console.log('<hi>');|"), "got {html}");
    }

    #[test]
    fn test_script_is_not_escaped() {
        let site = Site::new();
        fs::write(site.root.join("script.html"), "<script>{{ js }}</script>").unwrap();
        site.page("app", "layout: script.html", "");
        fs::write(site.root.join("app/script.js"), "if (a && b) alert('x');").unwrap();
        let mut renderer = site.renderer();

        let html = renderer.render_path("app", &HashMap::new(), false).unwrap();

        assert_eq!(html, "<script>if (a && b) alert('x');</script>");
    }

    #[test]
    fn test_sites_sharing_cache_dir_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let renderer_for = |site: &str, body: &str| {
            let root = tmp.path().join(site);
            fs::create_dir_all(root.join("home")).unwrap();
            fs::write(root.join("layout.html"), "{% include bodyContent %}").unwrap();
            fs::write(root.join("home").join(DEFAULT_MANIFEST), "").unwrap();
            fs::write(root.join("home").join(CONTENT_FILENAME), body).unwrap();
            PageRenderer::new(RendererConfig {
                page_root: root,
                cache_dir: Some(tmp.path().join("cache/result")),
                compile_dir: Some(tmp.path().join("cache/compile")),
                version: "test".to_owned(),
                ..RendererConfig::default()
            })
            .unwrap()
        };
        let mut a = renderer_for("site-a", "<p>site A</p>");
        let mut b = renderer_for("site-b", "<p>site B</p>");

        let html_a = a.render_path("home", &HashMap::new(), false).unwrap();
        let html_b = b.render_path("home", &HashMap::new(), false).unwrap();

        assert_eq!(html_a, "<p>site A</p>");
        assert_eq!(html_b, "<p>site B</p>");
        // Both stay cached side by side
        assert_eq!(a.render_path("home", &HashMap::new(), false).unwrap(), html_a);
    }

    #[test]
    fn test_computed_bindings_override_caller_data() {
        let site = Site::new();
        site.page("home", "", "body");
        let mut renderer = site.renderer();

        let html = renderer
            .render_path(
                "home",
                &data(&[
                    ("js", json!("alert(1)")),
                    ("bodyContent", json!("../../etc/passwd")),
                    ("rootURL", json!("https://evil.example/")),
                ]),
                false,
            )
            .unwrap();

        assert_eq!(html, "|https://example.com/|home/content.html||body");
    }

    #[test]
    fn test_manifest_bindings_have_lowest_precedence() {
        let site = Site::new();
        site.page(
            "home",
            "title: From manifest\nvars:\n  greeting: hello",
            "{{ greeting }}",
        );
        let mut renderer = site.renderer();

        let from_manifest = renderer.render_path("home", &HashMap::new(), true).unwrap();
        let from_caller = renderer
            .render_path("home", &data(&[("title", json!("From caller"))]), true)
            .unwrap();

        assert!(from_manifest.starts_with("From manifest|"));
        assert!(from_manifest.ends_with("|hello"));
        assert!(from_caller.starts_with("From caller|"));
    }

    #[test]
    fn test_manifest_layout_override_is_used() {
        let site = Site::new();
        fs::write(site.root.join("plain.html"), "[{% include bodyContent %}]").unwrap();
        site.page("home", "layout: plain.html", "body");
        let mut renderer = site.renderer();

        let page = renderer.resolve_page("home").unwrap();

        assert_eq!(page.layout(), "plain.html");
        assert_eq!(renderer.render(&page, &HashMap::new(), false).unwrap(), "[body]");
    }

    #[test]
    fn test_repeated_render_is_identical_and_cached() {
        let site = Site::new();
        site.page("home", "", "<main>v1</main>");
        let mut renderer = PageRenderer::new(site.cached_config()).unwrap();
        let args = data(&[("title", json!("Hi"))]);

        let first = renderer.render_path("home", &args, false).unwrap();
        // A cache hit ignores the edited source
        fs::write(site.root.join("home/content.html"), "<main>version 2</main>").unwrap();
        let second = renderer.render_path("home", &args, false).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_force_reload_bypasses_cache() {
        let site = Site::new();
        site.page("home", "", "<main>v1</main>");
        let mut renderer = PageRenderer::new(site.cached_config()).unwrap();
        let args = data(&[("title", json!("Hi"))]);

        renderer.render_path("home", &args, false).unwrap();
        fs::write(site.root.join("home/content.html"), "<main>version 2</main>").unwrap();
        let forced = renderer.render_path("home", &args, true).unwrap();

        assert!(forced.ends_with("<main>version 2</main>"), "got {forced}");
    }

    #[test]
    fn test_cache_survives_new_renderer_instance() {
        let site = Site::new();
        site.page("home", "", "<main>v1</main>");
        let args = data(&[("title", json!("Hi"))]);

        let first = PageRenderer::new(site.cached_config())
            .unwrap()
            .render_path("home", &args, false)
            .unwrap();
        fs::write(site.root.join("home/content.html"), "<main>version 2</main>").unwrap();
        let second = PageRenderer::new(site.cached_config())
            .unwrap()
            .render_path("home", &args, false)
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_render_path_unknown_page() {
        let site = Site::new();
        let mut renderer = site.renderer();

        let err = renderer
            .render_path("../../etc", &HashMap::new(), false)
            .unwrap_err();

        assert!(matches!(err, RenderError::NotFound(_)), "got {err:?}");
    }

    #[test]
    fn test_render_revalidates_removed_page() {
        let site = Site::new();
        site.page("home", "", "body");
        let mut renderer = site.renderer();
        let page = renderer.resolve_page("home").unwrap();

        fs::remove_file(site.root.join("home").join(CONTENT_FILENAME)).unwrap();

        assert!(matches!(
            renderer.render(&page, &HashMap::new(), false),
            Err(RenderError::NotFound(_))
        ));
    }

    #[test]
    fn test_template_error_propagates() {
        let site = Site::new();
        site.page("home", "", "{% if %}");
        let mut renderer = site.renderer();

        let err = renderer
            .render_path("home", &HashMap::new(), false)
            .unwrap_err();

        assert!(matches!(err, RenderError::Template(_)), "got {err:?}");
    }

    #[test]
    fn test_resolve_page_rejects_traversal() {
        let site = Site::new();
        site.page("home", "", "body");
        let outside = site.tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join(DEFAULT_MANIFEST), "").unwrap();
        fs::write(outside.join(CONTENT_FILENAME), "").unwrap();
        let renderer = site.renderer();

        assert!(renderer.resolve_page("home").is_some());
        assert!(renderer.resolve_page("../outside").is_none());
        assert!(renderer.resolve_page("home/../../outside").is_none());
        assert!(renderer.resolve_page("../../etc").is_none());
    }

    #[test]
    fn test_resolve_page_rejects_bad_manifest() {
        let site = Site::new();
        site.page("home", "exec: rm -rf /", "body");

        assert!(site.renderer().resolve_page("home").is_none());
    }

    #[test]
    fn test_custom_manifest_name() {
        let site = Site::new();
        let dir = site.root.join("home");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("page.yaml"), "").unwrap();
        fs::write(dir.join(CONTENT_FILENAME), "").unwrap();
        let renderer = PageRenderer::new(RendererConfig {
            manifest_name: "page.yaml".to_owned(),
            ..site.config()
        })
        .unwrap();

        assert!(renderer.resolve_page("home").is_some());
        assert!(site.renderer().resolve_page("home").is_none());
    }

    /// Engine double recording calls.
    #[derive(Clone, Default)]
    struct RecordingEngine {
        cached: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingEngine {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TemplateEngine for RecordingEngine {
        fn is_cached(&self, cache_id: &str) -> bool {
            self.calls.lock().unwrap().push(format!("is_cached {cache_id}"));
            self.cached
        }

        fn clear_cache(&self, cache_id: &str) {
            self.calls.lock().unwrap().push(format!("clear {cache_id}"));
        }

        fn assign(&mut self, name: &str, value: serde_json::Value) {
            self.calls.lock().unwrap().push(format!("assign {name}={value}"));
        }

        fn assign_safe(&mut self, name: &str, value: String) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("assign_safe {name}={value:?}"));
        }

        fn fetch(&mut self, template: &str, cache_id: &str) -> Result<String, EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("fetch {template} {cache_id}"));
            Ok(String::new())
        }
    }

    fn render_with(engine: &RecordingEngine, root: &Path, force: bool) {
        let config = RendererConfig {
            page_root: root.to_path_buf(),
            ..RendererConfig::default()
        };
        let mut renderer = PageRenderer::with_engine(config, Box::new(engine.clone())).unwrap();
        renderer
            .render_path("home", &data(&[("js", json!("x"))]), force)
            .unwrap();
    }

    #[test]
    fn test_cached_fragment_is_kept_without_force() {
        let site = Site::new();
        site.page("home", "", "body");
        let engine = RecordingEngine {
            cached: true,
            ..RecordingEngine::default()
        };

        render_with(&engine, &site.root, false);

        assert_eq!(
            engine.calls(),
            vec![
                "is_cached home/content.html",
                "assign js=\"x\"",
                "assign_safe js=\"\"",
                "assign_safe bodyContent=\"home/content.html\"",
                "assign_safe rootURL=\"/\"",
                "fetch layout.html home/content.html",
            ]
        );
    }

    #[test]
    fn test_uncached_fragment_is_cleared() {
        let site = Site::new();
        site.page("home", "", "body");
        let engine = RecordingEngine::default();

        render_with(&engine, &site.root, false);

        assert_eq!(engine.calls()[1], "clear home/content.html");
    }

    #[test]
    fn test_force_clears_cached_fragment() {
        let site = Site::new();
        site.page("home", "", "body");
        let engine = RecordingEngine {
            cached: true,
            ..RecordingEngine::default()
        };

        render_with(&engine, &site.root, true);

        // Short-circuits before asking the engine
        assert_eq!(engine.calls()[0], "clear home/content.html");
    }
}
