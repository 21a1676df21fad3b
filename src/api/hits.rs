use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};

use super::AppState;
use crate::api_error;
use crate::error::{MeridianError, Result};
use crate::hits::{AggregationKey, HitEvent, RegionHitsRequest, RegionHitsResponse};
use crate::region::{PeerInfo, RegionName};

/// Replicated counters untouched for this long are dropped by `/expire-keys`
pub const DEFAULT_EXPIRE_AFTER_MS: i64 = 120_000;

#[instrument(skip(state), level = "debug")]
pub async fn queue_hits(
    State(state): State<AppState>,
    axum::Json(hit): axum::Json<HitEvent>,
) -> Result<StatusCode> {
    if hit.hits <= 0 {
        return Err(api_error!("hits must be positive, got {}", hit.hits));
    }
    state.manager.queue_hits(hit).await.map_err(|err| {
        event!(
            Level::WARN,
            message = "Dropping hit, multi-region manager unavailable",
            err = format!("{:?}", err)
        );
        err
    })?;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state, request), fields(source = %request.source_region, count = request.hits.len()), level = "debug")]
pub async fn receive_region_hits(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<RegionHitsRequest>,
) -> Result<axum::Json<RegionHitsResponse>> {
    if &request.source_region == state.manager.region() {
        return Err(MeridianError::Api(format!(
            "refusing hits replicated from own region {}",
            request.source_region
        )));
    }
    let accepted = state
        .replicated
        .record(&request.source_region, &request.hits);
    Ok(axum::Json(RegionHitsResponse { accepted }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteHitsResponse {
    pub name: String,
    pub unique_key: String,
    pub hits: i64,
    pub last_source: RegionName,
    pub last_updated_ms: i64,
}

#[instrument(skip(state), level = "debug")]
pub async fn remote_hits(
    Path((name, unique_key)): Path<(String, String)>,
    State(state): State<AppState>,
) -> std::result::Result<axum::Json<RemoteHitsResponse>, StatusCode> {
    state
        .replicated
        .remote_hits(&AggregationKey::new(&name, &unique_key))
        .map(|remote| {
            axum::Json(RemoteHitsResponse {
                name,
                unique_key,
                hits: remote.hits,
                last_source: remote.last_source,
                last_updated_ms: remote.last_updated_ms,
            })
        })
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionsResponse {
    pub region: RegionName,
    pub regions: HashMap<RegionName, Vec<PeerInfo>>,
}

#[instrument(skip(state), level = "debug")]
pub async fn regions(State(state): State<AppState>) -> axum::Json<RegionsResponse> {
    axum::Json(RegionsResponse {
        region: state.registry.local_region().clone(),
        regions: state.registry.regions().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct ExpireKeysParams {
    pub max_age_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireKeysResponse {
    pub expired: usize,
    pub remaining: usize,
}

#[instrument(skip(state), level = "debug")]
pub async fn expire_keys(
    Query(params): Query<ExpireKeysParams>,
    State(state): State<AppState>,
) -> axum::Json<ExpireKeysResponse> {
    let expired = state
        .replicated
        .expire_keys(params.max_age_ms.unwrap_or(DEFAULT_EXPIRE_AFTER_MS));
    axum::Json(ExpireKeysResponse {
        expired,
        remaining: state.replicated.len(),
    })
}
