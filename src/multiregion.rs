//! Asynchronous propagation of hits to every other region.
//!
//! The decision path hands each hit to [`MultiRegionManager::queue_hits`].
//! A single background task merges hits by key and, once the batch is full or
//! the sync wait has passed since the first hit of the cycle, sends the batch
//! to every region the registry knows about. Sends run in their own tasks so
//! a slow region never holds up ingestion.
//!
//! Delivery is best-effort: failed sends are logged and not retried, and
//! hits still batched when the manager stops are dropped.
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::error::{MeridianError, Result};
use crate::hits::{AggregationBatch, HitEvent, RegionHit, RegionHitsRequest};
use crate::interval::IntervalTimer;
use crate::region::{HitSender, PeerInfo, PeerPicker, RegionName, RegionRegistry};
use crate::settings::BehaviorSettings;

/// A hit waiting at the hand-off along with the reply that releases its producer
#[derive(Debug)]
struct QueuedHit {
    event: HitEvent,
    accepted: oneshot::Sender<()>,
}

#[derive(Debug)]
struct RunningLoop {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Aggregates hits and propagates them to other regions
#[derive(Debug)]
pub struct MultiRegionManager {
    region: RegionName,
    // Single slot: together with the acceptance reply this is a rendezvous,
    // a producer is never more than one hit ahead of the loop.
    req_queue: mpsc::Sender<QueuedHit>,
    running: Mutex<Option<RunningLoop>>,
}

impl MultiRegionManager {
    /// Validate `behaviors` and spawn the processing loop.
    /// Must be called from within a tokio runtime.
    pub fn start(
        region: RegionName,
        behaviors: &BehaviorSettings,
        registry: Arc<dyn RegionRegistry>,
        sender: Arc<dyn HitSender>,
    ) -> Result<Self> {
        behaviors.validate()?;

        let (req_queue, req_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            region: region.clone(),
            sync_wait: behaviors.multi_region_sync_wait,
            batch_limit: behaviors.multi_region_batch_limit,
            dispatcher: Dispatcher {
                region: region.clone(),
                registry,
                sender,
                timeout: behaviors.multi_region_timeout,
                in_flight: Arc::new(Semaphore::new(behaviors.multi_region_max_in_flight)),
            },
        };
        info!(
            "[{}] Starting multi-region manager: sync wait {:?}, batch limit {}",
            region, behaviors.multi_region_sync_wait, behaviors.multi_region_batch_limit
        );
        let handle = tokio::spawn(worker.run(req_rx, shutdown_rx));

        Ok(Self {
            region,
            req_queue,
            running: Mutex::new(Some(RunningLoop {
                shutdown_tx,
                handle,
            })),
        })
    }

    pub fn region(&self) -> &RegionName {
        &self.region
    }

    /// Hand a hit to the manager to be sent to other regions.
    ///
    /// Returns once the processing loop has taken the hit, so callers wait
    /// while the loop is busy. Fails with `Shutdown` once the manager stops.
    pub async fn queue_hits(&self, event: HitEvent) -> Result<()> {
        let (accepted, accepted_rx) = oneshot::channel();
        self.req_queue
            .send(QueuedHit { event, accepted })
            .await
            .map_err(|_| MeridianError::Shutdown)?;
        // A hit left in the slot when the loop exits is dropped with its reply
        accepted_rx.await.map_err(|_| MeridianError::Shutdown)
    }

    pub fn is_running(&self) -> bool {
        !self.req_queue.is_closed()
    }

    /// Stop the processing loop and wait for it to exit.
    /// Hits not yet sent are discarded. Safe to call more than once.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(RunningLoop {
            shutdown_tx,
            handle,
        }) = running.take()
        {
            // The loop may already be gone if its task panicked
            let _ = shutdown_tx.send(());
            if let Err(e) = handle.await {
                warn!("[{}] Multi-region loop ended abnormally: {}", self.region, e);
            }
            info!("[{}] Multi-region manager stopped", self.region);
        }
    }
}

/// Owns the current batch; nothing else touches it
struct Worker {
    region: RegionName,
    sync_wait: Duration,
    batch_limit: usize,
    dispatcher: Dispatcher,
}

impl Worker {
    async fn run(
        self,
        mut req_rx: mpsc::Receiver<QueuedHit>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        let mut interval = IntervalTimer::new(self.sync_wait);
        let mut hits = AggregationBatch::new();

        loop {
            tokio::select! {
                Some(QueuedHit { event, accepted }) = req_rx.recv() => {
                    let was_empty = hits.is_empty();
                    hits.add(event);

                    if hits.len() >= self.batch_limit {
                        debug!("[{}] Batch limit {} reached", self.region, self.batch_limit);
                        self.dispatcher.flush(std::mem::take(&mut hits)).await;
                        interval.stop();
                    } else if was_empty {
                        // Window is anchored on the first hit of the cycle
                        interval.next();
                        debug!(
                            "[{}] Batch window open for {:?}",
                            self.region,
                            interval.duration()
                        );
                    }
                    // Producer may have given up waiting
                    let _ = accepted.send(());
                }
                _ = interval.tick() => {
                    if !hits.is_empty() {
                        self.dispatcher.flush(std::mem::take(&mut hits)).await;
                    }
                }
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }

        if !hits.is_empty() {
            debug!(
                "[{}] Dropping {} unsent hit(s) on shutdown",
                self.region,
                hits.len()
            );
        }
    }
}

/// Fans a flushed batch out to regions and peers
struct Dispatcher {
    region: RegionName,
    registry: Arc<dyn RegionRegistry>,
    sender: Arc<dyn HitSender>,
    timeout: Duration,
    in_flight: Arc<Semaphore>,
}

impl Dispatcher {
    async fn flush(&self, hits: AggregationBatch) {
        let pickers = self.registry.region_pickers().await;
        if pickers.is_empty() {
            debug!(
                "[{}] No other regions known, dropping {} hit(s)",
                self.region,
                hits.len()
            );
            return;
        }
        for (region, picker) in pickers {
            info!(
                "[{}] Sending {} hit(s) to {} picker",
                self.region,
                hits.len(),
                region
            );
            self.send_hits(&region, &hits, picker.as_ref());
        }
    }

    /// Each key goes to the peer that owns it in `region`
    fn send_hits(&self, region: &RegionName, hits: &AggregationBatch, picker: &dyn PeerPicker) {
        let mut by_peer: HashMap<PeerInfo, Vec<RegionHit>> = HashMap::new();
        for hit in hits.region_hits() {
            match picker.get(&hit.hash_key()) {
                Ok(peer) => by_peer.entry(peer).or_default().push(hit),
                Err(e) => {
                    warn!("[{}] Skipping region {}: {}", self.region, region, e);
                    return;
                }
            }
        }

        for (peer, region_hits) in by_peer {
            let permit = match self.in_flight.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(
                        "[{}] Too many sends in flight, dropping {} hit(s) for {}",
                        self.region,
                        region_hits.len(),
                        peer.address
                    );
                    continue;
                }
            };
            let request = RegionHitsRequest {
                source_region: self.region.clone(),
                hits: region_hits,
            };
            let sender = self.sender.clone();
            let timeout = self.timeout;
            let local_region = self.region.clone();
            tokio::spawn(async move {
                match time::timeout(timeout, sender.send_hits(&peer, &request)).await {
                    Ok(Ok(())) => debug!(
                        "[{}] Sent {} hit(s) to {} ({})",
                        local_region,
                        request.hits.len(),
                        peer.address,
                        peer.region
                    ),
                    Ok(Err(e)) => warn!(
                        "[{}] Failed sending hits to {} ({}): {}",
                        local_region, peer.address, peer.region, e
                    ),
                    Err(_) => warn!(
                        "[{}] Timed out after {:?} sending hits to {} ({})",
                        local_region, timeout, peer.address, peer.region
                    ),
                }
                drop(permit);
            });
        }
    }
}
