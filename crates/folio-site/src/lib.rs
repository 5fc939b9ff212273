//! Page resolution and rendering for Folio.
//!
//! A site is a page root holding a layout template and one directory per
//! page:
//!
//! ```text
//! pages/
//! +-- layout.html
//! +-- home/
//!     +-- data.yaml      # manifest (required, may be empty)
//!     +-- content.html   # content template (required)
//!     +-- script.js      # bound as `js` (optional)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::collections::HashMap;
//! use folio_site::{PageRenderer, RendererConfig};
//!
//! let mut renderer = PageRenderer::new(RendererConfig::default())?;
//! let html = renderer.render_path("home", &HashMap::new(), false)?;
//! # Ok(())
//! # }
//! ```

mod manifest;
mod page;
mod renderer;

pub use manifest::{ManifestError, PageManifest, parse_manifest};
pub use page::{CONTENT_FILENAME, DEFAULT_LAYOUT, DEFAULT_MANIFEST, Page, SCRIPT_FILENAME};
pub use renderer::{PageRenderer, RenderError, RendererConfig};
