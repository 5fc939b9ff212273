//! Page manifest parsing.
//!
//! Every page directory carries a YAML manifest (`data.yaml` by default).
//! It is data only: the fields below are the complete set a page can
//! override.
//!
//! ```yaml
//! layout: layouts/wide.html   # relative to the page root
//! title: Getting started
//! description: First steps
//! vars:
//!   show_toc: true
//!   authors: [alice, bob]
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

/// Parsed page manifest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageManifest {
    /// Layout template replacing the default, relative to the page root.
    #[serde(default)]
    pub layout: Option<String>,

    /// Bound as `title`.
    #[serde(default)]
    pub title: Option<String>,

    /// Bound as `description`.
    #[serde(default)]
    pub description: Option<String>,

    /// Additional static bindings.
    #[serde(default)]
    pub vars: BTreeMap<String, serde_json::Value>,
}

impl PageManifest {
    /// Static bindings contributed by this manifest, lowest precedence
    /// first: `title` and `description`, then `vars`.
    pub(crate) fn bindings(&self) -> impl Iterator<Item = (&str, serde_json::Value)> {
        let fixed = [("title", &self.title), ("description", &self.description)]
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .as_ref()
                    .map(|v| (name, serde_json::Value::String(v.clone())))
            });
        fixed.chain(self.vars.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }
}

/// Error returned when a manifest cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Malformed YAML or unknown fields.
    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Parse a manifest. Empty or whitespace-only content is an empty manifest.
///
/// # Errors
///
/// Returns an error for malformed YAML, wrongly typed or unknown fields.
pub fn parse_manifest(content: &str) -> Result<PageManifest, ManifestError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(PageManifest::default());
    }
    Ok(serde_yaml::from_str(trimmed)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_manifest_is_default() {
        assert_eq!(parse_manifest("").unwrap(), PageManifest::default());
        assert_eq!(parse_manifest("  \n\t ").unwrap(), PageManifest::default());
    }

    #[test]
    fn test_parse_all_fields() {
        let yaml = r#"
layout: layouts/wide.html
title: "Getting started"
description: |
  First steps
vars:
  show_toc: true
  order: 3
  authors:
    - alice
    - bob
"#;
        let manifest = parse_manifest(yaml).unwrap();

        assert_eq!(manifest.layout.as_deref(), Some("layouts/wide.html"));
        assert_eq!(manifest.title.as_deref(), Some("Getting started"));
        assert_eq!(manifest.description.as_deref(), Some("First steps\n"));
        assert_eq!(manifest.vars.get("show_toc"), Some(&json!(true)));
        assert_eq!(manifest.vars.get("order"), Some(&json!(3)));
        assert_eq!(manifest.vars.get("authors"), Some(&json!(["alice", "bob"])));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = parse_manifest("title: Home\nrequire: evil.php").unwrap_err();
        assert!(err.to_string().contains("require"), "got {err}");
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        assert!(parse_manifest("title: [unclosed").is_err());
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert!(parse_manifest("vars: [1, 2]").is_err());
    }

    #[test]
    fn test_bindings_order() {
        let manifest = parse_manifest("title: Home\nvars:\n  title: Override\n  a: 1").unwrap();

        let bindings: Vec<_> = manifest.bindings().collect();

        assert_eq!(
            bindings,
            vec![
                ("title", json!("Home")),
                ("a", json!(1)),
                ("title", json!("Override")),
            ]
        );
    }
}
