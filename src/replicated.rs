use chrono::Utc;
use papaya::HashMap;
use serde::{Deserialize, Serialize};

use crate::hits::{AggregationKey, RegionHit};
use crate::region::RegionName;

/// Hits this region has been told about by other regions.
///
/// Counts here are advisory input for convergence. They are only ever
/// accumulated; nothing in this store decides whether a client is over its
/// limit, and rule parameters are never taken from remote regions.
#[derive(Debug, Default)]
pub struct ReplicatedHits {
    counters: HashMap<AggregationKey, RemoteHits>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteHits {
    pub hits: i64,
    pub last_source: RegionName,
    pub last_updated_ms: i64,
}

impl ReplicatedHits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Add hits received from `source`. Returns how many entries were applied.
    pub fn record(&self, source: &RegionName, hits: &[RegionHit]) -> usize {
        let now = Utc::now().timestamp_millis();
        let counters = self.counters.pin();
        let mut applied = 0;
        for hit in hits.iter().filter(|h| h.hits > 0) {
            counters.update_or_insert_with(
                hit.hash_key(),
                |current| RemoteHits {
                    hits: current.hits.saturating_add(hit.hits),
                    last_source: source.clone(),
                    last_updated_ms: now,
                },
                || RemoteHits {
                    hits: hit.hits,
                    last_source: source.clone(),
                    last_updated_ms: now,
                },
            );
            applied += 1;
        }
        applied
    }

    pub fn remote_hits(&self, key: &AggregationKey) -> Option<RemoteHits> {
        self.counters.pin().get(key).cloned()
    }

    /// Drop counters not updated within `max_age_ms` to keep the map from growing endlessly
    pub fn expire_keys(&self, max_age_ms: i64) -> usize {
        let cutoff = Utc::now().timestamp_millis() - max_age_ms;
        let before = self.counters.len();
        // pin_owned since the retain may touch the whole map
        self.counters
            .pin_owned()
            .retain(|_key, counter| counter.last_updated_ms > cutoff);
        before.saturating_sub(self.counters.len())
    }
}
