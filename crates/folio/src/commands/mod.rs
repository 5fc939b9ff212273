//! CLI command implementations.

pub(crate) mod check;
pub(crate) mod render;

use std::path::PathBuf;

use clap::Args;
use folio_config::{CliSettings, Config};
use folio_site::{PageRenderer, RendererConfig};

use crate::error::CliError;

pub(crate) use check::CheckArgs;
pub(crate) use render::RenderArgs;

/// Site arguments shared by all commands.
#[derive(Args)]
pub(crate) struct SiteArgs {
    /// Path to configuration file (default: auto-discover folio.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page root directory (overrides config).
    #[arg(short, long, env = "FOLIO_PAGE_ROOT")]
    page_root: Option<PathBuf>,

    /// Base URL bound as `rootURL` (overrides config).
    #[arg(long, env = "FOLIO_BASE_URL")]
    base_url: Option<String>,

    /// Disable caching.
    #[arg(long)]
    no_cache: bool,

    /// Enable verbose output (resolution and cache logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl SiteArgs {
    /// Load configuration with these arguments applied.
    fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            page_root: self.page_root.clone(),
            base_url: self.base_url.clone(),
            cache_enabled: self.no_cache.then_some(false),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// Build a renderer from the loaded configuration.
    pub(crate) fn renderer(&self, version: &str) -> Result<PageRenderer, CliError> {
        let config = self.load_config()?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }
        Ok(PageRenderer::new(renderer_config(&config, version))?)
    }
}

/// Map loaded configuration to renderer settings.
fn renderer_config(config: &Config, version: &str) -> RendererConfig {
    let cache = &config.cache_resolved;
    RendererConfig {
        page_root: config.site_resolved.page_root.clone(),
        base_url: config.site_resolved.base_url.clone(),
        cache_dir: cache.enabled.then(|| cache.dir.clone()),
        compile_dir: cache.enabled.then(|| cache.compile_dir.clone()),
        cache_lifetime: cache.lifetime,
        manifest_name: config.site_resolved.manifest.clone(),
        version: version.to_owned(),
    }
}
