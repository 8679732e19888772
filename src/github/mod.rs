// GitHub API module.
// Client and types for the repository tree and contents endpoints.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{GITHUB_API_BASE, GitHubClient};
pub use types::*;
