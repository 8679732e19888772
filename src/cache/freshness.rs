// Freshness policies.
// Decide whether a cached record can be shown, and whether it still needs a fetch.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::store::CacheRecord;

/// Default TTL for tree listings: 5 minutes.
pub const DEFAULT_TREE_TTL: Duration = Duration::from_secs(5 * 60);

/// Three-valued result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fresh,
    Stale,
    Absent,
}

impl Verdict {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Verdict::Fresh)
    }
}

/// How a resource class decides freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Fresh while younger than the TTL. A zero TTL is always stale.
    Ttl(Duration),
    /// Fresh while the record's fingerprint matches the source's. Without a
    /// current fingerprint to compare against, a record is shown
    /// provisionally and revalidated.
    Fingerprint,
}

/// Result of checking one record against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub verdict: Verdict,
    /// Whether the orchestrator must still go to the network.
    pub needs_fetch: bool,
}

impl FreshnessPolicy {
    /// Assess a record (or its absence).
    ///
    /// `current_fingerprint` is the fingerprint of the authoritative source
    /// when the caller already has it in hand; it is ignored by TTL policies.
    pub fn assess<T>(
        &self,
        record: Option<&CacheRecord<T>>,
        now: DateTime<Utc>,
        current_fingerprint: Option<&str>,
    ) -> Assessment {
        let Some(record) = record else {
            return Assessment {
                verdict: Verdict::Absent,
                needs_fetch: true,
            };
        };

        match self {
            FreshnessPolicy::Ttl(ttl) => {
                let verdict = ttl_verdict(record.stored_at, now, *ttl);
                Assessment {
                    verdict,
                    needs_fetch: !verdict.is_fresh(),
                }
            }
            FreshnessPolicy::Fingerprint => match current_fingerprint {
                Some(current) if record.fingerprint.as_deref() == Some(current) => Assessment {
                    verdict: Verdict::Fresh,
                    needs_fetch: false,
                },
                Some(_) => Assessment {
                    verdict: Verdict::Stale,
                    needs_fetch: true,
                },
                None => Assessment {
                    verdict: Verdict::Fresh,
                    needs_fetch: true,
                },
            },
        }
    }

    /// Verdict only; see [`FreshnessPolicy::assess`].
    pub fn verdict<T>(
        &self,
        record: Option<&CacheRecord<T>>,
        now: DateTime<Utc>,
        current_fingerprint: Option<&str>,
    ) -> Verdict {
        self.assess(record, now, current_fingerprint).verdict
    }
}

fn ttl_verdict(stored_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> Verdict {
    if ttl.is_zero() {
        return Verdict::Stale;
    }

    // A record from the future (clock skew) counts as brand new.
    let age = now
        .signed_duration_since(stored_at)
        .to_std()
        .unwrap_or(Duration::ZERO);

    if age < ttl {
        Verdict::Fresh
    } else {
        Verdict::Stale
    }
}
