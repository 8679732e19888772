// Observable request state.
// What an orchestrator publishes to the UI for the resource currently requested.

use std::fmt;

use crate::cache::CacheKey;

/// Where a ready value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A usable cached record, shown without waiting for the network.
    Cache,
    /// An expired record, shown because the refetch failed.
    StaleCache,
    /// A value fetched for this request.
    Network,
}

/// Loading state for one requested resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState<T> {
    #[default]
    Idle,
    Loading,
    Ready {
        value: T,
        origin: Origin,
    },
    /// Declared size exceeds the preview limit; nothing was fetched.
    TooLarge {
        size: u64,
        limit: u64,
    },
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            LoadState::Ready { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn origin(&self) -> Option<Origin> {
        match self {
            LoadState::Ready { origin, .. } => Some(*origin),
            _ => None,
        }
    }
}

/// Logical identity of one request: resource locator plus variant parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    parts: Vec<String>,
}

impl RequestIdentity {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::encode(&self.parts)
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(" "))
    }
}

/// Latest state published by an orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Generation of the request this state belongs to.
    pub generation: u64,
    pub identity: Option<RequestIdentity>,
    pub state: LoadState<T>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            identity: None,
            state: LoadState::Idle,
        }
    }
}
