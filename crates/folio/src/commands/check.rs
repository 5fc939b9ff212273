//! `folio check` command implementation.

use clap::Args;

use crate::commands::SiteArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Page path relative to the page root (e.g. `docs/intro`).
    page: String,

    #[command(flatten)]
    pub site: SiteArgs,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// # Errors
    ///
    /// Returns `CliError::PageNotFound` if the page does not resolve.
    pub(crate) fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();
        let renderer = self.site.renderer(version)?;

        let page = renderer
            .resolve_page(&self.page)
            .ok_or_else(|| CliError::PageNotFound(self.page.clone()))?;

        output.success(&format!("Page {} resolves", page.name()));
        output.field("Directory", &page.dir().display().to_string());
        output.field("Layout", page.layout());
        output.field("Content", &page.content_template());
        if let Some(title) = &page.manifest().title {
            output.field("Title", title);
        }
        Ok(())
    }
}
