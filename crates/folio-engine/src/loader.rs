//! Template source loading.
//!
//! Sources are read from the template root through the compile store: an
//! entry is reused while the file's mtime and length are unchanged. Store
//! keys are prefixed with a digest of the root, so roots sharing one store
//! never see each other's sources. Names that would resolve outside the
//! root, through `..` or a symlink, load as "not found".

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use folio_cache::{CacheBucket, CacheBucketExt};
use minijinja::{Error, ErrorKind};

use crate::key::root_scope;

/// Template sources under a canonical root.
pub(crate) struct TemplateSources {
    root: PathBuf,
    scope: String,
    store: Arc<dyn CacheBucket>,
}

impl TemplateSources {
    /// `root` must already be canonical.
    pub(crate) fn new(root: PathBuf, store: Arc<dyn CacheBucket>) -> Self {
        let scope = root_scope(&root);
        Self { root, scope, store }
    }

    /// Loader callback for `minijinja`: `Ok(None)` means not found.
    pub(crate) fn load(&self, name: &str) -> Result<Option<String>, Error> {
        let Some(path) = self.locate(name) else {
            tracing::debug!(template = name, "Template not found under root");
            return Ok(None);
        };

        // Removed between lookup and stat
        let Some(etag) = source_etag(&path) else {
            tracing::debug!(template = name, "Template vanished while loading");
            return Ok(None);
        };
        let key = format!("{}/{name}", self.scope);
        if let Some(source) = self.store.get_string(&key, &etag) {
            return Ok(Some(source));
        }

        let source = fs::read_to_string(&path).map_err(|e| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {name}"),
            )
            .with_source(e)
        })?;
        self.store.set_string(&key, &etag, &source);
        tracing::debug!(template = name, "Loaded template source");
        Ok(Some(source))
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let canonical = self.root.join(relative).canonicalize().ok()?;
        (canonical.starts_with(&self.root) && canonical.is_file()).then_some(canonical)
    }
}

/// Etag for a source file: mtime in nanoseconds and length. `None` if the
/// file cannot be stat'ed.
fn source_etag(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).ok()?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());
    Some(format!("{mtime}-{}", meta.len()))
}
