// Error types for grove.
// Covers GitHub API failures, rendering failures, configuration, and local IO.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroveError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Content too large to preview: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Highlighting failed: {0}")]
    Highlight(String),

    #[error("Invalid repository reference: {0}")]
    InvalidRepo(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl GroveError {
    /// HTTP-like status code implied by this error, when there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GroveError::Api(err) => err.status().map(|s| s.as_u16()),
            GroveError::Unauthorized => Some(401),
            GroveError::NotFound(_) => Some(404),
            GroveError::RateLimited { .. } => Some(403),
            GroveError::Http { status, .. } => Some(*status),
            GroveError::TooLarge { .. } => Some(413),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for GroveError {
    fn from(err: config::ConfigError) -> Self {
        GroveError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GroveError>;
