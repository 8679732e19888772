// Fetch orchestration.
// Cache-first read-through with a generation counter so only the latest
// request may write to the cache or change what observers see.

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheKey, FreshnessPolicy, KeyedCache, Verdict};
use crate::error::{GroveError, Result};
use crate::lock::mutex_lock;

use super::state::{LoadState, Origin, RequestIdentity, Snapshot};

const SOURCE: &str = "fetch::orchestrator";

/// One request for a resource.
#[derive(Debug, Clone)]
pub struct Request {
    pub identity: RequestIdentity,
    /// Size the collaborator reported before fetching, if known.
    pub declared_size: Option<u64>,
    /// Fingerprint of the authoritative source, when the caller already has it.
    pub current_fingerprint: Option<String>,
}

impl Request {
    pub fn new(identity: RequestIdentity) -> Self {
        Self {
            identity,
            declared_size: None,
            current_fingerprint: None,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn with_current_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.current_fingerprint = Some(fingerprint.into());
        self
    }
}

/// A value returned by a fetcher, with the fingerprint of its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<V> {
    pub value: V,
    pub fingerprint: Option<String>,
}

impl<V> Fetched<V> {
    pub fn new(value: V, fingerprint: Option<String>) -> Self {
        Self { value, fingerprint }
    }

    /// A value whose freshness is not content based.
    pub fn untracked(value: V) -> Self {
        Self::new(value, None)
    }
}

/// How one `resolve` call ended.
#[derive(Debug)]
pub enum Outcome<V> {
    /// Served from cache; no fetch was needed.
    Cached(V),
    /// Fetched and written through.
    Fetched(V),
    /// The fetch failed but a cached value stays on display.
    Fallback { value: V, error: GroveError },
    /// A newer request took over; the result was discarded.
    Superseded,
    TooLarge { size: u64, limit: u64 },
    Failed(GroveError),
}

impl<V> Outcome<V> {
    pub fn value(&self) -> Option<&V> {
        match self {
            Outcome::Cached(value) | Outcome::Fetched(value) | Outcome::Fallback { value, .. } => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<V> {
        match self {
            Outcome::Cached(value) | Outcome::Fetched(value) | Outcome::Fallback { value, .. } => {
                Ok(value)
            }
            Outcome::Superseded => Err(GroveError::Other("request superseded".to_string())),
            Outcome::TooLarge { size, limit } => Err(GroveError::TooLarge { size, limit }),
            Outcome::Failed(err) => Err(err),
        }
    }
}

#[derive(Default)]
struct Inner {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Coordinates requests for one resource class.
///
/// Only one identity is current at a time. Every request bumps the
/// generation; results tagged with an older generation are dropped without
/// touching the cache or the published state.
pub struct Orchestrator<V> {
    cache: KeyedCache<V>,
    max_bytes: Option<u64>,
    inner: Mutex<Inner>,
    tx: watch::Sender<Snapshot<V>>,
}

impl<V> Orchestrator<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(cache: KeyedCache<V>) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self {
            cache,
            max_bytes: None,
            inner: Mutex::new(Inner::default()),
            tx,
        }
    }

    /// Refuse requests whose declared size exceeds `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn cache(&self) -> &KeyedCache<V> {
        &self.cache
    }

    /// Watch the state of the current request.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<V>> {
        self.tx.subscribe()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> Snapshot<V> {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        mutex_lock(&self.inner, SOURCE, "generation").generation
    }

    /// Resolve a request: publish a usable cached value at once, fetch when
    /// the policy asks for it, and write through if still current.
    pub async fn resolve<F>(&self, request: Request, fetch: F) -> Outcome<V>
    where
        F: Future<Output = Result<Fetched<V>>>,
    {
        let generation = self.begin();
        self.resolve_with(generation, request, fetch).await
    }

    /// Run `resolve` on a background task, aborting the previous task so a
    /// superseded HTTP request is dropped rather than left to finish.
    ///
    /// The generation is taken here, not when the task first runs, so call
    /// order decides which request is current.
    pub fn spawn<F>(self: &Arc<Self>, request: Request, fetch: F)
    where
        F: Future<Output = Result<Fetched<V>>> + Send + 'static,
    {
        let previous = {
            let mut inner = mutex_lock(&self.inner, SOURCE, "spawn");
            inner.generation += 1;
            let generation = inner.generation;
            let this = Arc::clone(self);
            let handle = tokio::spawn(async move {
                let _ = this.resolve_with(generation, request, fetch).await;
            });
            inner.task.replace(handle)
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    async fn resolve_with<F>(&self, generation: u64, request: Request, fetch: F) -> Outcome<V>
    where
        F: Future<Output = Result<Fetched<V>>>,
    {
        let identity = request.identity;
        let current_fingerprint = request.current_fingerprint;
        let key = identity.key();

        if let (Some(size), Some(limit)) = (request.declared_size, self.max_bytes) {
            if size > limit {
                debug!(%identity, size, limit, "Refusing oversized resource");
                self.publish(generation, &identity, LoadState::TooLarge { size, limit });
                return Outcome::TooLarge { size, limit };
            }
        }

        let lookup = self.cache.lookup(&key, current_fingerprint.as_deref());
        let component = self.cache.store().namespace().component();

        let shown = match (&lookup.record, lookup.assessment.verdict) {
            (Some(record), Verdict::Fresh) => {
                metrics::counter!("grove_cache_hit_total", "component" => component).increment(1);
                self.publish(
                    generation,
                    &identity,
                    LoadState::Ready {
                        value: record.payload.clone(),
                        origin: Origin::Cache,
                    },
                );
                Some(record.payload.clone())
            }
            _ => {
                metrics::counter!("grove_cache_miss_total", "component" => component).increment(1);
                self.publish(generation, &identity, LoadState::Loading);
                None
            }
        };

        if !lookup.assessment.needs_fetch {
            if let Some(value) = shown {
                return Outcome::Cached(value);
            }
        }

        let result = fetch.await;

        // The generation check, the write and the publish happen under one
        // lock so a newer request cannot slip in between them.
        let inner = mutex_lock(&self.inner, SOURCE, "resolve.complete");
        if inner.generation != generation {
            debug!(%identity, generation, current = inner.generation, "Discarding superseded result");
            metrics::counter!("grove_cache_superseded_total", "component" => component)
                .increment(1);
            return Outcome::Superseded;
        }

        match result {
            Ok(fetched) => {
                debug!(%identity, "Fetched resource");
                let written = self
                    .cache
                    .write(&key, &fetched.value, fetched.fingerprint.clone());
                self.send(
                    generation,
                    &identity,
                    LoadState::Ready {
                        value: fetched.value.clone(),
                        origin: Origin::Network,
                    },
                );
                drop(inner);

                if written {
                    self.cache.prune_after_write(&key);
                }
                Outcome::Fetched(fetched.value)
            }
            Err(error) => {
                if let Some(value) = shown {
                    warn!(%identity, %error, "Refresh failed, keeping cached value");
                    return Outcome::Fallback { value, error };
                }
                // A fingerprint mismatch means the record describes other
                // content, so it is never shown in place of the new one.
                let expired = match self.cache.policy() {
                    FreshnessPolicy::Ttl(_) => lookup.record,
                    FreshnessPolicy::Fingerprint => {
                        lookup.record.filter(|_| current_fingerprint.is_none())
                    }
                };
                if let Some(record) = expired {
                    warn!(%identity, %error, "Fetch failed, showing expired cached value");
                    self.send(
                        generation,
                        &identity,
                        LoadState::Ready {
                            value: record.payload.clone(),
                            origin: Origin::StaleCache,
                        },
                    );
                    return Outcome::Fallback {
                        value: record.payload,
                        error,
                    };
                }
                warn!(%identity, %error, "Fetch failed");
                self.send(generation, &identity, LoadState::Failed(error.to_string()));
                Outcome::Failed(error)
            }
        }
    }

    /// Drop whatever is in flight and go back to idle.
    pub fn cancel(&self) {
        let mut inner = mutex_lock(&self.inner, SOURCE, "cancel");
        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        self.tx.send_replace(Snapshot {
            generation: inner.generation,
            identity: None,
            state: LoadState::Idle,
        });
    }

    /// Remove the cached entry for an identity.
    pub fn invalidate(&self, identity: &RequestIdentity) {
        let key: CacheKey = identity.key();
        self.cache.invalidate(&key);
    }

    fn begin(&self) -> u64 {
        let mut inner = mutex_lock(&self.inner, SOURCE, "begin");
        inner.generation += 1;
        inner.generation
    }

    /// Publish `state` if `generation` is still current.
    fn publish(&self, generation: u64, identity: &RequestIdentity, state: LoadState<V>) -> bool {
        let inner = mutex_lock(&self.inner, SOURCE, "publish");
        if inner.generation != generation {
            return false;
        }
        self.send(generation, identity, state);
        true
    }

    fn send(&self, generation: u64, identity: &RequestIdentity, state: LoadState<V>) {
        self.tx.send_replace(Snapshot {
            generation,
            identity: Some(identity.clone()),
            state,
        });
    }
}
