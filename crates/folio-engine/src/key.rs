//! Fingerprints for cached fragments.

use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Inputs that determine a rendered fragment.
///
/// Two fetches with the same root, template and bindings produce the same
/// hash, so a cached fragment is only reused for identical inputs.
#[derive(Debug)]
pub struct FragmentKey<'a, B: ?Sized> {
    /// Canonical template root.
    pub root: &'a Path,
    /// Template passed to `fetch` (usually the layout).
    pub template: &'a str,
    /// Variables assigned before the fetch.
    pub bindings: &'a B,
}

impl<B: Serialize + ?Sized> FragmentKey<'_, B> {
    /// SHA-256 of the root, the template name and the JSON form of the
    /// bindings, hex encoded.
    ///
    /// Bindings should be an ordered map so the JSON, and therefore the
    /// hash, does not depend on assignment order.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.root.as_os_str().as_encoded_bytes());
        hasher.update([0u8]);
        hasher.update(self.template.as_bytes());
        hasher.update([0u8]);
        // Serializing a map of JSON values cannot fail
        if let Ok(json) = serde_json::to_vec(self.bindings) {
            hasher.update(&json);
        }
        hex::encode(hasher.finalize())
    }
}

/// Short prefix separating the entries of different template roots that
/// share one cache directory.
pub(crate) fn root_scope(root: &Path) -> String {
    let digest = Sha256::digest(root.as_os_str().as_encoded_bytes());
    hex::encode(&digest.as_slice()[..8])
}
