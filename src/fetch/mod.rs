// Fetch module.
// Orchestrates cache-first fetching and publishes per-request state.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Fetched, Orchestrator, Outcome, Request};
pub use state::{LoadState, Origin, RequestIdentity, Snapshot};
