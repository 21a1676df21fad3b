//! Transport seam between the multi-region manager and remote regions
use std::time::Duration;

use async_trait::async_trait;

use super::PeerInfo;
use crate::api::paths;
use crate::error::{MeridianError, Result};
use crate::hits::RegionHitsRequest;

#[async_trait]
pub trait HitSender: Send + Sync {
    /// Deliver one batch of hit counts to a single peer
    async fn send_hits(&self, peer: &PeerInfo, request: &RegionHitsRequest) -> Result<()>;
}

/// Sends hits to a peer's HTTP API
#[derive(Clone, Debug)]
pub struct HttpHitSender {
    client: reqwest::Client,
}

impl HttpHitSender {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HitSender for HttpHitSender {
    async fn send_hits(&self, peer: &PeerInfo, request: &RegionHitsRequest) -> Result<()> {
        let url = format!(
            "{}{}",
            peer.address.trim_end_matches('/'),
            paths::region::HITS
        );
        let resp = self.client.post(url).json(request).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(MeridianError::Transport(format!(
                "{} rejected {} hit(s) with status {}",
                peer.address,
                request.hits.len(),
                status.as_u16()
            )))
        }
    }
}
