//! Regions, the peers inside them, and how a flush finds them.
//!
//! The multi-region manager never holds on to a region or peer between
//! cycles: every flush asks the [`RegionRegistry`] for the current pickers,
//! so regions added or removed in the meantime are honoured.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub mod sender;

use crate::consistent_hashing::jump_consistent_hash;
use crate::dispatch_error;
use crate::error::Result;
use crate::hits::AggregationKey;
pub use sender::{HitSender, HttpHitSender};

/// Name of an independently operating deployment (datacenter, zone)
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash,
)]
pub struct RegionName(String);

impl RegionName {
    pub fn new(name: String) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RegionName {
    fn from(name: &str) -> Self {
        RegionName::new(name.to_string())
    }
}

impl From<String> for RegionName {
    fn from(name: String) -> Self {
        RegionName::new(name)
    }
}

impl std::fmt::Display for RegionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reachable instance of the service
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    /// Base URL, e.g. `http://10.0.0.1:8420`
    pub address: String,
    pub region: RegionName,
}

impl PeerInfo {
    pub fn new(address: impl Into<String>, region: impl Into<RegionName>) -> Self {
        Self {
            address: address.into(),
            region: region.into(),
        }
    }
}

/// Selects the peer inside one region that owns a key
pub trait PeerPicker: Send + Sync {
    fn get(&self, key: &AggregationKey) -> Result<PeerInfo>;
    fn peers(&self) -> Vec<PeerInfo>;
}

/// Supplies the regions known right now, each with its picker
#[async_trait]
pub trait RegionRegistry: Send + Sync {
    async fn region_pickers(&self) -> HashMap<RegionName, Arc<dyn PeerPicker>>;
}

/// Picks the owner of a key with jump consistent hashing over a fixed peer list
#[derive(Clone, Debug)]
pub struct HashPeerPicker {
    region: RegionName,
    peers: Vec<PeerInfo>,
}

impl HashPeerPicker {
    pub fn new(region: RegionName, mut peers: Vec<PeerInfo>) -> Self {
        // Owners must not depend on insertion order
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        Self { region, peers }
    }
}

impl PeerPicker for HashPeerPicker {
    fn get(&self, key: &AggregationKey) -> Result<PeerInfo> {
        if self.peers.is_empty() {
            return Err(dispatch_error!("region {} has no peers", self.region));
        }
        let number_of_buckets = u32::try_from(self.peers.len())
            .map_err(|e| dispatch_error!("too many peers in {}: {}", self.region, e))?;
        let bucket = jump_consistent_hash(key.as_str(), number_of_buckets);
        Ok(self.peers[bucket as usize].clone())
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.peers.clone()
    }
}

/// Region topology held in memory and replaced wholesale or peer by peer.
/// Peers in the local region are never targets.
#[derive(Debug)]
pub struct StaticRegionRegistry {
    local_region: RegionName,
    regions: RwLock<HashMap<RegionName, Vec<PeerInfo>>>,
}

impl StaticRegionRegistry {
    pub fn new(local_region: RegionName) -> Self {
        Self {
            local_region,
            regions: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_peers(local_region: RegionName, peers: &[PeerInfo]) -> Self {
        Self {
            regions: RwLock::new(group_by_region(&local_region, peers)),
            local_region,
        }
    }

    pub fn local_region(&self) -> &RegionName {
        &self.local_region
    }

    /// Replace the whole topology
    pub async fn set_peers(&self, peers: &[PeerInfo]) {
        let regions = group_by_region(&self.local_region, peers);
        *self.regions.write().await = regions;
    }

    /// Returns false if the peer was already known or belongs to the local region
    pub async fn add_peer(&self, peer: PeerInfo) -> bool {
        if peer.region == self.local_region {
            return false;
        }
        let mut regions = self.regions.write().await;
        let peers = regions.entry(peer.region.clone()).or_default();
        if peers.contains(&peer) {
            false
        } else {
            peers.push(peer);
            true
        }
    }

    pub async fn remove_region(&self, region: &RegionName) -> Option<Vec<PeerInfo>> {
        self.regions.write().await.remove(region)
    }

    /// Snapshot of the current topology
    pub async fn regions(&self) -> HashMap<RegionName, Vec<PeerInfo>> {
        self.regions.read().await.clone()
    }
}

fn group_by_region(
    local_region: &RegionName,
    peers: &[PeerInfo],
) -> HashMap<RegionName, Vec<PeerInfo>> {
    let mut regions: HashMap<RegionName, Vec<PeerInfo>> = HashMap::new();
    for peer in peers.iter().filter(|p| &p.region != local_region) {
        let region_peers = regions.entry(peer.region.clone()).or_default();
        if !region_peers.contains(peer) {
            region_peers.push(peer.clone());
        }
    }
    regions
}

#[async_trait]
impl RegionRegistry for StaticRegionRegistry {
    async fn region_pickers(&self) -> HashMap<RegionName, Arc<dyn PeerPicker>> {
        self.regions
            .read()
            .await
            .iter()
            .map(|(region, peers)| {
                let picker: Arc<dyn PeerPicker> =
                    Arc::new(HashPeerPicker::new(region.clone(), peers.clone()));
                (region.clone(), picker)
            })
            .collect()
    }
}
