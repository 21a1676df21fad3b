//! Meridian application settings
use std::net::SocketAddr;
use std::time::Duration;

use crate::config_error;
use crate::error::Result;
use crate::region::{PeerInfo, RegionName};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 8420;
pub const DEFAULT_PORT_HTTP: &str = "8420";

pub const DEFAULT_MULTI_REGION_SYNC_WAIT_MS: &str = "1000";
pub const DEFAULT_MULTI_REGION_BATCH_LIMIT: &str = "1000";
pub const DEFAULT_MULTI_REGION_TIMEOUT_MS: &str = "500";
pub const DEFAULT_MULTI_REGION_MAX_IN_FLIGHT: &str = "64";

/// Tuning for cross-region propagation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BehaviorSettings {
    // How long the first hit of a cycle may wait before the batch is sent
    pub multi_region_sync_wait: Duration,
    // Distinct keys per batch before it is sent without waiting
    pub multi_region_batch_limit: usize,
    // Upper bound on a single send to one peer
    pub multi_region_timeout: Duration,
    // Sends allowed in flight at once; further sends are dropped
    pub multi_region_max_in_flight: usize,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            multi_region_sync_wait: Duration::from_secs(1),
            multi_region_batch_limit: 1000,
            multi_region_timeout: Duration::from_millis(500),
            multi_region_max_in_flight: 64,
        }
    }
}

impl BehaviorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.multi_region_sync_wait.is_zero() {
            return Err(config_error!("multi-region sync wait must be positive"));
        }
        if self.multi_region_batch_limit == 0 {
            return Err(config_error!("multi-region batch limit must be positive"));
        }
        if self.multi_region_timeout.is_zero() {
            return Err(config_error!("multi-region timeout must be positive"));
        }
        if self.multi_region_max_in_flight == 0 {
            return Err(config_error!(
                "multi-region max in-flight sends must be positive"
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: String,

    // HTTP API listen port
    pub listen_port: u16,

    // Region this instance runs in
    pub region: RegionName,

    // Peers in other regions
    pub regions: Vec<PeerInfo>,

    // Propagation tuning
    pub behaviors: BehaviorSettings,

    // Emit logs as JSON
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: STANDARD_PORT_HTTP,
            region: RegionName::from("default"),
            regions: Vec::new(),
            behaviors: BehaviorSettings::default(),
            log_json: false,
        }
    }
}

impl Settings {
    pub fn listen_socket_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.listen_address, self.listen_port)
            .parse()
            .map_err(|e| {
                config_error!(
                    "Invalid listen address {}:{}: {}",
                    self.listen_address,
                    self.listen_port,
                    e
                )
            })
    }
}

/// Parse `region=url`, e.g. `east=http://10.0.0.1:8420`
pub fn parse_region_peer(value: &str) -> Result<PeerInfo> {
    let (region, address) = value
        .split_once('=')
        .ok_or_else(|| config_error!("Expected region=url, got '{}'", value))?;
    if region.is_empty() {
        return Err(config_error!("Missing region name in '{}'", value));
    }
    let url = url::Url::parse(address)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(config_error!("Unsupported scheme in '{}'", address));
    }
    Ok(PeerInfo::new(
        url.as_str().trim_end_matches('/'),
        RegionName::from(region),
    ))
}
