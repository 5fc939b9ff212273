//! Page resolution.
//!
//! A page path is resolved against the page root by canonicalizing it, which
//! follows symlinks and folds `..`, and only then comparing path components
//! with the canonical root. A page must be a strict descendant of the root
//! and hold both a manifest and a content template.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::manifest::{ManifestError, PageManifest, parse_manifest};

/// Content template file inside a page directory.
pub const CONTENT_FILENAME: &str = "content.html";
/// Optional script file inside a page directory, bound as `js`.
pub const SCRIPT_FILENAME: &str = "script.js";
/// Default layout template at the page root.
pub const DEFAULT_LAYOUT: &str = "layout.html";
/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "data.yaml";

/// A resolved page.
///
/// Only produced by [`PageRenderer::resolve_page`](crate::PageRenderer::resolve_page),
/// so holding one means the page passed the root and file checks.
#[derive(Clone, Debug)]
pub struct Page {
    name: String,
    dir: PathBuf,
    layout: String,
    manifest: PageManifest,
}

impl Page {
    /// Normalized page name relative to the root (e.g. `docs/intro`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical page directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Layout template name, relative to the root.
    #[must_use]
    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Parsed manifest.
    #[must_use]
    pub fn manifest(&self) -> &PageManifest {
        &self.manifest
    }

    /// Content template name, relative to the root.
    #[must_use]
    pub fn content_template(&self) -> String {
        format!("{}/{CONTENT_FILENAME}", self.name)
    }
}

/// Why a page path did not resolve.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Unresolved {
    #[error("path does not exist")]
    Missing,
    #[error("path escapes the page root")]
    OutsideRoot,
    #[error("not a page directory")]
    NotADirectory,
    #[error("manifest {0} is missing")]
    NoManifest(String),
    #[error("content template is missing")]
    NoContent,
    #[error("manifest could not be read: {0}")]
    ManifestIo(#[from] std::io::Error),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("layout {0} is not a template under the page root")]
    BadLayout(String),
}

/// Resolve `page_path` under the canonical `root`.
pub(crate) fn resolve(
    root: &Path,
    manifest_name: &str,
    page_path: &str,
) -> Result<Page, Unresolved> {
    let relative = page_path.trim_start_matches('/');
    let dir = root
        .join(relative)
        .canonicalize()
        .map_err(|_| Unresolved::Missing)?;

    // Component-wise: `/srv/pages-old` does not start with `/srv/pages`
    if dir == root || !dir.starts_with(root) {
        return Err(Unresolved::OutsideRoot);
    }
    if !dir.is_dir() {
        return Err(Unresolved::NotADirectory);
    }

    let manifest_path = contained_file(root, &dir.join(manifest_name))
        .ok_or_else(|| Unresolved::NoManifest(manifest_name.to_owned()))?;
    contained_file(root, &dir.join(CONTENT_FILENAME)).ok_or(Unresolved::NoContent)?;

    let name = template_name(root, &dir).ok_or(Unresolved::OutsideRoot)?;
    let manifest = parse_manifest(&fs::read_to_string(manifest_path)?)?;

    let layout = match &manifest.layout {
        Some(layout) => contained_file(root, &root.join(layout.trim_start_matches('/')))
            .and_then(|path| template_name(root, &path))
            .ok_or_else(|| Unresolved::BadLayout(layout.clone()))?,
        None => DEFAULT_LAYOUT.to_owned(),
    };

    Ok(Page {
        name,
        dir,
        layout,
        manifest,
    })
}

/// Check that an already resolved page is still a renderable page.
pub(crate) fn still_valid(root: &Path, page: &Page) -> bool {
    contained(root, &page.dir).is_some_and(|dir| dir == page.dir)
        && contained_file(root, &page.dir.join(CONTENT_FILENAME)).is_some()
}

/// Canonical form of `path` if it exists strictly inside `root`.
fn contained(root: &Path, path: &Path) -> Option<PathBuf> {
    let canonical = path.canonicalize().ok()?;
    (canonical != root && canonical.starts_with(root)).then_some(canonical)
}

/// Like [`contained`], restricted to regular files.
pub(crate) fn contained_file(root: &Path, path: &Path) -> Option<PathBuf> {
    contained(root, path).filter(|p| p.is_file())
}

/// `/`-separated name of `path` relative to `root`. `None` for paths
/// outside the root or with non UTF-8 components.
fn template_name(root: &Path, path: &Path) -> Option<String> {
    let parts = path
        .strip_prefix(root)
        .ok()?
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
