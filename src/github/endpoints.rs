// GitHub API endpoint functions.
// Typed methods for the tree and contents endpoints.

use crate::error::Result;

use super::client::GitHubClient;
use super::types::{RepoRef, Tree};

/// Media type that makes the contents endpoint return the raw file body.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

impl GitHubClient {
    /// Get the full recursive tree of a repository at a ref.
    pub async fn get_tree(&self, repo: &RepoRef) -> Result<Tree> {
        let url = self.endpoint([
            "repos",
            repo.owner.as_str(),
            repo.repo.as_str(),
            "git",
            "trees",
            repo.reference.as_str(),
        ])?;
        let response = self.get_with_params(url, &[("recursive", "1")]).await?;
        let tree: Tree = response.json().await?;
        Ok(tree)
    }

    /// Get the raw text of a file at a ref.
    pub async fn get_file_text(&self, repo: &RepoRef, path: &str) -> Result<String> {
        let segments = ["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|segment| !segment.is_empty()));
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("ref", &repo.reference);

        let response = self.get_with_accept(url, Some(RAW_MEDIA_TYPE)).await?;
        let text = response.text().await?;
        Ok(text)
    }
}
