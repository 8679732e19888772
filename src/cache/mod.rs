// Cache module for persistent, bounded caching of remote resources.
// Keys, fingerprints, media, the bounded store, and freshness policies.

pub mod freshness;
pub mod hash;
pub mod key;
pub mod keyed;
pub mod medium;
pub mod paths;
pub mod store;

pub use freshness::{Assessment, DEFAULT_TREE_TTL, FreshnessPolicy, Verdict};
pub use hash::fingerprint;
pub use key::CacheKey;
pub use keyed::{KeyedCache, Lookup};
pub use medium::{DiskMedium, Medium, MemoryMedium, Namespace};
pub use store::{BoundedStore, CacheRecord};
