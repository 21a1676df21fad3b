//! CLI for this application
//!
use std::time::Duration;

use crate::region::{PeerInfo, RegionName};
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[command(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("MERIDIAN_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("MERIDIAN_HTTP_LISTEN_PORT"),
        help = "Port to bind Meridian HTTP API server to"
    )]
    pub listen_port: u16,

    // Name of the local region
    #[clap(
        long,
        default_value = "default",
        env("MERIDIAN_REGION"),
        help = "Region this instance belongs to"
    )]
    pub region: String,

    // Peers in other regions
    #[clap(
        long = "region-peer",
        env("MERIDIAN_REGION_PEERS"),
        value_delimiter = ',',
        value_parser = settings::parse_region_peer,
        help = "Peer in another region as region=url (e.g., east=http://10.0.0.1:8420). Repeatable."
    )]
    pub region_peers: Vec<PeerInfo>,

    // Multi-region settings: flush interval
    #[clap(
        long,
        default_value = settings::DEFAULT_MULTI_REGION_SYNC_WAIT_MS,
        env("MERIDIAN_MULTI_REGION_SYNC_WAIT_MS"),
        help = "Milliseconds hits may wait before being sent to other regions"
    )]
    pub multi_region_sync_wait_ms: u64,

    // Multi-region settings: batch size trigger
    #[clap(
        long,
        default_value = settings::DEFAULT_MULTI_REGION_BATCH_LIMIT,
        env("MERIDIAN_MULTI_REGION_BATCH_LIMIT"),
        help = "Distinct keys per batch before sending immediately"
    )]
    pub multi_region_batch_limit: usize,

    // Multi-region settings: per-send timeout
    #[clap(
        long,
        default_value = settings::DEFAULT_MULTI_REGION_TIMEOUT_MS,
        env("MERIDIAN_MULTI_REGION_TIMEOUT_MS"),
        help = "Timeout in milliseconds for a send to one peer"
    )]
    pub multi_region_timeout_ms: u64,

    // Multi-region settings: concurrent sends
    #[clap(
        long,
        default_value = settings::DEFAULT_MULTI_REGION_MAX_IN_FLIGHT,
        env("MERIDIAN_MULTI_REGION_MAX_IN_FLIGHT"),
        help = "Maximum sends to other regions in flight at once"
    )]
    pub multi_region_max_in_flight: usize,

    #[clap(long, env("MERIDIAN_LOG_JSON"), help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            region: RegionName::from(self.region),
            regions: self.region_peers,
            behaviors: settings::BehaviorSettings {
                multi_region_sync_wait: Duration::from_millis(self.multi_region_sync_wait_ms),
                multi_region_batch_limit: self.multi_region_batch_limit,
                multi_region_timeout: Duration::from_millis(self.multi_region_timeout_ms),
                multi_region_max_in_flight: self.multi_region_max_in_flight,
            },
            log_json: self.log_json,
        }
    }
}
