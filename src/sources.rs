// Remote sources the browser fetches from.
// Tree and content traits, implemented for the GitHub client.

use async_trait::async_trait;

use crate::error::Result;
use crate::github::{GitHubClient, RepoRef, Tree};

/// Lists the files of a repository at a ref.
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn fetch_tree(&self, repo: &RepoRef) -> Result<Tree>;
}

/// Fetches the raw text of one file.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_content(&self, repo: &RepoRef, path: &str) -> Result<String>;
}

#[async_trait]
impl TreeSource for GitHubClient {
    async fn fetch_tree(&self, repo: &RepoRef) -> Result<Tree> {
        self.get_tree(repo).await
    }
}

#[async_trait]
impl ContentSource for GitHubClient {
    async fn fetch_content(&self, repo: &RepoRef, path: &str) -> Result<String> {
        self.get_file_text(repo, path).await
    }
}
