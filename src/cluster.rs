//! Local multi-instance bootstrap for end-to-end tests.
//!
//! Each [`LocalCluster`] owns its daemons and peer list, so concurrent tests
//! can run independent clusters side by side.
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::net::TcpListener;
use tracing::info;

use crate::config_error;
use crate::daemon::Daemon;
use crate::error::Result;
use crate::region::{PeerInfo, RegionName};
use crate::settings::{BehaviorSettings, Settings};

/// Short enough for tests, far too short for production
pub const TEST_SYNC_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct LocalCluster {
    daemons: Vec<Daemon>,
    peers: Vec<PeerInfo>,
}

impl LocalCluster {
    /// Start `instances` daemons on ephemeral localhost ports, each in its
    /// own region. Zero instances still starts one.
    pub async fn start(instances: usize) -> Result<Self> {
        let addresses = vec![""; instances.max(1)];
        Self::start_with(&addresses).await
    }

    /// Start one daemon per `host:port` address; an empty address means an
    /// ephemeral localhost port. If any daemon fails to start, those already
    /// running are closed and the error is returned.
    pub async fn start_with(addresses: &[&str]) -> Result<Self> {
        let mut daemons: Vec<Daemon> = Vec::with_capacity(addresses.len());
        for (i, address) in addresses.iter().enumerate() {
            match spawn_daemon(i, address).await {
                Ok(daemon) => daemons.push(daemon),
                Err(e) => {
                    for daemon in daemons.iter_mut() {
                        daemon.close().await;
                    }
                    return Err(config_error!(
                        "while starting daemon for address '{}': {}",
                        address,
                        e
                    ));
                }
            }
        }

        let peers: Vec<PeerInfo> = daemons.iter().map(Daemon::peer_info).collect();
        // Tell each instance about the others
        for daemon in &daemons {
            daemon.set_peers(&peers).await;
        }
        info!("Local cluster started with {} daemon(s)", daemons.len());

        Ok(Self { daemons, peers })
    }

    pub fn peers(&self) -> &[PeerInfo] {
        &self.peers
    }

    pub fn daemons(&self) -> &[Daemon] {
        &self.daemons
    }

    /// Panics if `idx` is out of range
    pub fn peer_at(&self, idx: usize) -> &PeerInfo {
        &self.peers[idx]
    }

    /// Panics if `idx` is out of range
    pub fn daemon_at(&self, idx: usize) -> &Daemon {
        &self.daemons[idx]
    }

    pub fn random_peer(&self) -> Option<&PeerInfo> {
        self.peers.choose(&mut rand::thread_rng())
    }

    pub async fn stop(mut self) {
        for daemon in self.daemons.iter_mut() {
            daemon.close().await;
        }
        self.daemons.clear();
        self.peers.clear();
    }
}

async fn spawn_daemon(idx: usize, address: &str) -> Result<Daemon> {
    let listener = if address.is_empty() {
        TcpListener::bind("127.0.0.1:0").await?
    } else {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| config_error!("expected host:port"))?;
        let port: u16 = port
            .parse()
            .map_err(|e| config_error!("invalid port '{}': {}", port, e))?;
        TcpListener::bind((host, port)).await?
    };

    let settings = Settings {
        listen_address: "127.0.0.1".to_string(),
        listen_port: 0,
        region: RegionName::from(format!("region-{}", idx)),
        regions: Vec::new(),
        behaviors: BehaviorSettings {
            multi_region_sync_wait: TEST_SYNC_WAIT,
            multi_region_timeout: Duration::from_secs(1),
            ..Default::default()
        },
        log_json: false,
    };
    Daemon::spawn_on(listener, settings).await
}
