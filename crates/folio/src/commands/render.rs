//! `folio render` command implementation.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::commands::SiteArgs;
use crate::error::CliError;
use crate::output::Output;

type Data = HashMap<String, serde_json::Value>;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Page path relative to the page root (e.g. `docs/intro`).
    page: String,

    /// Template variable as `key=value`. Values are parsed as JSON when
    /// valid, otherwise taken as strings. May be repeated.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    /// JSON file holding an object of template variables.
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Bypass the cached fragment.
    #[arg(short, long)]
    force: bool,

    /// Write the rendered page to a file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[command(flatten)]
    pub site: SiteArgs,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables are malformed, the page does not
    /// resolve, or rendering fails.
    pub(crate) fn execute(self, version: &str) -> Result<(), CliError> {
        let data = self.collect_data()?;
        let mut renderer = self.site.renderer(version)?;

        let page = renderer
            .resolve_page(&self.page)
            .ok_or_else(|| CliError::PageNotFound(self.page.clone()))?;
        let html = renderer.render(&page, &data, self.force)?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &html)?;
                Output::new().success(&format!("Wrote {}", path.display()));
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(html.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    /// Merge `--data` and `--var` values; `--var` wins.
    fn collect_data(&self) -> Result<Data, CliError> {
        let mut data = match &self.data {
            Some(path) => read_data_file(path)?,
            None => Data::new(),
        };
        for var in &self.vars {
            let (key, value) = parse_var(var)?;
            data.insert(key, value);
        }
        Ok(data)
    }
}

/// Parse a `key=value` pair.
fn parse_var(var: &str) -> Result<(String, serde_json::Value), CliError> {
    let (key, raw) = var
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| CliError::Validation(format!("Invalid --var {var:?}: expected KEY=VALUE")))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| raw.into());
    Ok((key.to_owned(), value))
}

fn read_data_file(path: &Path) -> Result<Data, CliError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| CliError::Data {
        path: path.to_path_buf(),
        source,
    })
}
