// GitHub API response types.
// Repository references, tree listings, and rate-limit state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GroveError;

/// Ref used when none is given.
pub const DEFAULT_REF: &str = "HEAD";

/// A repository at a given ref: `owner/repo@ref`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub reference: String,
}

impl RepoRef {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            reference: reference.into(),
        }
    }

    /// Web URL of a file at this ref; identifies the source of a rendering.
    pub fn blob_url(&self, path: &str) -> String {
        format!(
            "https://github.com/{}/{}/blob/{}/{}",
            self.owner, self.repo, self.reference, path
        )
    }
}

impl FromStr for RepoRef {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (slug, reference) = match s.split_once('@') {
            Some((slug, reference)) if !reference.is_empty() => (slug, reference),
            Some(_) => return Err(GroveError::InvalidRepo(s.to_string())),
            None => (s, DEFAULT_REF),
        };

        match slug.split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(Self::new(owner, repo, reference))
            }
            _ => Err(GroveError::InvalidRepo(s.to_string())),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.reference)
    }
}

/// Git object type of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule.
    Commit,
    #[serde(other)]
    Unknown,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Present for blobs only.
    #[serde(default)]
    pub size: Option<u64>,
}

/// A repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub sha: String,
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
    /// GitHub truncates very large recursive listings.
    #[serde(default)]
    pub truncated: bool,
}

impl Tree {
    /// Look up an entry by path.
    pub fn entry(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    /// Blob entries only.
    pub fn files(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Blob)
    }
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_ref() {
        let parsed: RepoRef = "octo/hello@main".parse().unwrap();
        assert_eq!(parsed, RepoRef::new("octo", "hello", "main"));
        assert_eq!(parsed.to_string(), "octo/hello@main");

        let default: RepoRef = "octo/hello".parse().unwrap();
        assert_eq!(default.reference, DEFAULT_REF);

        assert!("octo".parse::<RepoRef>().is_err());
        assert!("octo/".parse::<RepoRef>().is_err());
        assert!("octo/hello@".parse::<RepoRef>().is_err());
        assert!("a/b/c".parse::<RepoRef>().is_err());
    }

    #[test]
    fn test_deserialize_tree() {
        let json = r#"{
            "sha": "abc123",
            "url": "https://api.github.com/repos/octo/hello/git/trees/abc123",
            "tree": [
                {"path": "src", "mode": "040000", "type": "tree", "sha": "d1"},
                {"path": "src/lib.rs", "mode": "100644", "type": "blob", "sha": "d2", "size": 120},
                {"path": "vendor/dep", "mode": "160000", "type": "commit", "sha": "d3"}
            ],
            "truncated": false
        }"#;

        let tree: Tree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.entries.len(), 3);
        assert_eq!(tree.entry("src/lib.rs").unwrap().size, Some(120));
        assert_eq!(tree.entry("src").unwrap().kind, EntryKind::Tree);
        assert_eq!(tree.entry("vendor/dep").unwrap().kind, EntryKind::Commit);
        assert_eq!(tree.files().count(), 1);
    }

    #[test]
    fn test_blob_url() {
        let repo = RepoRef::new("octo", "hello", "main");
        assert_eq!(
            repo.blob_url("src/lib.rs"),
            "https://github.com/octo/hello/blob/main/src/lib.rs"
        );
    }
}
