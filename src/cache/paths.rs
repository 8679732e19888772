// Cache path utilities.
// Lays out on-disk entries as <root>/<component>/<version>/<sha256(key)>.entry.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};

use super::key::CacheKey;
use super::medium::Namespace;

/// Extension used for entry files.
pub const ENTRY_EXTENSION: &str = "entry";

/// Get the base cache directory (~/.cache/grove on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "grove").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path to a namespace's directory.
pub fn namespace_dir(root: &Path, namespace: &Namespace) -> PathBuf {
    root.join(sanitize_name(namespace.component()))
        .join(format!("v{}", namespace.version()))
}

/// Path to the file holding one entry.
pub fn entry_path(root: &Path, namespace: &Namespace, key: &CacheKey) -> PathBuf {
    namespace_dir(root, namespace).join(entry_file_name(key))
}

/// File name for a key. Hashed so arbitrary repository paths stay within
/// filesystem name limits.
pub fn entry_file_name(key: &CacheKey) -> String {
    let digest = Sha256::digest(key.as_str().as_bytes());
    format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION)
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
