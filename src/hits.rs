//! Hit events produced by the decision path and the batches they merge into
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::region::RegionName;

/// Rate limit algorithm named by a rule. Carried along with a hit but never
/// interpreted during propagation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    TokenBucket,
    LeakyBucket,
}

/// Rule parameters attached to a hit: opaque to this crate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RuleParams {
    pub limit: i64,
    pub duration_ms: i64,
    #[serde(default)]
    pub algorithm: Algorithm,
}

/// Identity of one logical counter: rule name plus client key
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct AggregationKey(String);

impl AggregationKey {
    pub fn new(name: &str, unique_key: &str) -> Self {
        Self(format!("{}_{}", name, unique_key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observed hit against a rate limit rule
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct HitEvent {
    pub name: String,
    pub unique_key: String,
    pub hits: i64,
    #[serde(default)]
    pub params: RuleParams,
}

impl HitEvent {
    pub fn new(name: impl Into<String>, unique_key: impl Into<String>, hits: i64) -> Self {
        Self {
            name: name.into(),
            unique_key: unique_key.into(),
            hits,
            params: RuleParams::default(),
        }
    }

    pub fn with_params(mut self, params: RuleParams) -> Self {
        self.params = params;
        self
    }

    pub fn hash_key(&self) -> AggregationKey {
        AggregationKey::new(&self.name, &self.unique_key)
    }
}

/// Hits accumulated during one cycle, at most one entry per key.
///
/// The first event seen for a key keeps its `params` for the rest of the
/// cycle; later events for the same key only contribute their hit count.
#[derive(Clone, Debug, Default)]
pub struct AggregationBatch {
    hits: HashMap<AggregationKey, HitEvent>,
}

impl AggregationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an event into the batch. Returns true if it added a new key.
    pub fn add(&mut self, event: HitEvent) -> bool {
        match self.hits.get_mut(&event.hash_key()) {
            Some(existing) => {
                // Pinned at i64::MAX rather than overflowing
                existing.hits = existing.hits.saturating_add(event.hits);
                false
            }
            None => {
                self.hits.insert(event.hash_key(), event);
                true
            }
        }
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn get(&self, key: &AggregationKey) -> Option<&HitEvent> {
        self.hits.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AggregationKey, &HitEvent)> {
        self.hits.iter()
    }

    /// Wire form of the batch: hit counts only, rule parameters stay local
    pub fn region_hits(&self) -> Vec<RegionHit> {
        self.hits.values().map(RegionHit::from).collect()
    }
}

/// A hit count sent to another region
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RegionHit {
    pub name: String,
    pub unique_key: String,
    pub hits: i64,
}

impl RegionHit {
    pub fn hash_key(&self) -> AggregationKey {
        AggregationKey::new(&self.name, &self.unique_key)
    }
}

impl From<&HitEvent> for RegionHit {
    fn from(event: &HitEvent) -> Self {
        Self {
            name: event.name.clone(),
            unique_key: event.unique_key.clone(),
            hits: event.hits,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RegionHitsRequest {
    pub source_region: RegionName,
    pub hits: Vec<RegionHit>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RegionHitsResponse {
    pub accepted: usize,
}
