//! A running instance: HTTP listener, multi-region manager and region registry
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{self, AppState};
use crate::error::Result;
use crate::multiregion::MultiRegionManager;
use crate::region::{HttpHitSender, PeerInfo, RegionName, StaticRegionRegistry};
use crate::replicated::ReplicatedHits;
use crate::settings::Settings;

#[derive(Debug)]
pub struct Daemon {
    local_addr: SocketAddr,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl Daemon {
    /// Bind the listener from `settings` and start serving
    pub async fn spawn(settings: Settings) -> Result<Self> {
        let listener = TcpListener::bind(settings.listen_socket_address()?).await?;
        Self::spawn_on(listener, settings).await
    }

    /// Start serving on an already bound listener; the listen address in
    /// `settings` is ignored.
    pub async fn spawn_on(listener: TcpListener, settings: Settings) -> Result<Self> {
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(StaticRegionRegistry::from_peers(
            settings.region.clone(),
            &settings.regions,
        ));
        let sender = Arc::new(HttpHitSender::new(
            settings.behaviors.multi_region_timeout,
        )?);
        let manager = Arc::new(MultiRegionManager::start(
            settings.region.clone(),
            &settings.behaviors,
            registry.clone(),
            sender,
        )?);
        let state = AppState {
            manager,
            registry,
            replicated: Arc::new(ReplicatedHits::new()),
        };

        let router = api::api(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let region = settings.region.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!("[{}] HTTP server exited with error: {}", region, e);
            }
        });
        info!("[{}] Meridian listening on {}", settings.region, local_addr);

        Ok(Self {
            local_addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL other instances use to reach this one
    pub fn address(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn region(&self) -> &RegionName {
        self.state.manager.region()
    }

    pub fn peer_info(&self) -> PeerInfo {
        PeerInfo::new(self.address(), self.region().clone())
    }

    pub fn manager(&self) -> &Arc<MultiRegionManager> {
        &self.state.manager
    }

    pub fn registry(&self) -> &Arc<StaticRegionRegistry> {
        &self.state.registry
    }

    pub fn replicated(&self) -> &Arc<ReplicatedHits> {
        &self.state.replicated
    }

    /// Replace the set of known peers; peers in this daemon's region are ignored
    pub async fn set_peers(&self, peers: &[PeerInfo]) {
        self.state.registry.set_peers(peers).await;
    }

    /// Stop propagation, then the HTTP server
    pub async fn close(&mut self) {
        self.state.manager.stop().await;
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(server) = self.server.take() {
            if let Err(e) = server.await {
                warn!("[{}] HTTP server task failed: {}", self.region(), e);
            }
        }
        info!("[{}] Meridian on {} closed", self.region(), self.local_addr);
    }
}

/// A daemon dropped without `close` still shuts its server down. The
/// multi-region loop exits once the server releases the last handle to its
/// manager. Neither is awaited here.
impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            debug!(
                "[{}] Daemon on {} dropped without close, shutting down",
                self.region(),
                self.local_addr
            );
            let _ = shutdown_tx.send(());
        }
    }
}
