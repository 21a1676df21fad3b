//! Cross-region hit propagation for a distributed rate-limiting service.
//!
//! Hits observed in one region are merged by key and sent in batches to
//! every other region, off the latency-sensitive decision path.
pub mod api;
pub mod cli;
pub mod cluster;
pub mod consistent_hashing;
pub mod daemon;
pub mod error;
pub mod hits;
pub mod interval;
pub mod multiregion;
pub mod region;
pub mod replicated;
pub mod settings;

pub use error::{MeridianError, Result};
pub use hits::{AggregationBatch, AggregationKey, HitEvent, RuleParams};
pub use multiregion::MultiRegionManager;
