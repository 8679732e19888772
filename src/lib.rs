// grove: cached browsing of GitHub repository trees, files, and
// highlighted source.

pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod github;
pub mod highlight;
pub mod sources;
pub mod telemetry;

pub(crate) mod lock;

pub use browser::{Browser, BrowserOptions};
pub use error::{GroveError, Result};
