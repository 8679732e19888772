// Typed cache over one bounded namespace.
// Pairs a store with the freshness policy of a single resource class.

use std::marker::PhantomData;

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::freshness::{Assessment, FreshnessPolicy};
use super::key::CacheKey;
use super::store::{BoundedStore, CacheRecord};

/// Result of looking a key up.
#[derive(Debug, Clone)]
pub struct Lookup<V> {
    pub record: Option<CacheRecord<V>>,
    pub assessment: Assessment,
}

/// Cache for values of type `V` under one namespace and policy.
pub struct KeyedCache<V> {
    store: BoundedStore,
    policy: FreshnessPolicy,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for KeyedCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy,
            _value: PhantomData,
        }
    }
}

impl<V> KeyedCache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(store: BoundedStore, policy: FreshnessPolicy) -> Self {
        Self {
            store,
            policy,
            _value: PhantomData,
        }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    pub fn store(&self) -> &BoundedStore {
        &self.store
    }

    /// Look up a key and assess it against the policy.
    pub fn lookup(&self, key: &CacheKey, current_fingerprint: Option<&str>) -> Lookup<V> {
        let record = self.store.get::<V>(key);
        let assessment = self
            .policy
            .assess(record.as_ref(), Utc::now(), current_fingerprint);
        debug!(
            key = %self.store.namespace().qualify(key),
            verdict = ?assessment.verdict,
            needs_fetch = assessment.needs_fetch,
            "Cache lookup"
        );
        Lookup { record, assessment }
    }

    /// Write a value through to the store, stamped now.
    pub fn insert(&self, key: &CacheKey, value: &V, fingerprint: Option<String>) {
        if self.write(key, value, fingerprint) {
            self.prune_after_write(key);
        }
    }

    /// Write without enforcing the namespace bound. Pair with
    /// [`KeyedCache::prune_after_write`].
    pub fn write(&self, key: &CacheKey, value: &V, fingerprint: Option<String>) -> bool {
        let record = CacheRecord::new(key.clone(), value, fingerprint);
        self.store.write(&record)
    }

    /// Enforce the namespace bound, keeping `key`.
    pub fn prune_after_write(&self, key: &CacheKey) {
        self.store.prune_after_put(key);
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.store.invalidate(key);
    }
}
