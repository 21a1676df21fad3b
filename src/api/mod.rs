mod base;
pub mod hits;

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse, routing, Router,
};
use tokio::time::Duration;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

pub mod paths;

pub use base::AboutResponse;

use crate::multiregion::MultiRegionManager;
use crate::region::StaticRegionRegistry;
use crate::replicated::ReplicatedHits;

/// Shared by every handler
#[derive(Clone, Debug)]
pub struct AppState {
    pub manager: Arc<MultiRegionManager>,
    pub registry: Arc<StaticRegionRegistry>,
    pub replicated: Arc<ReplicatedHits>,
}

/// Build the API around one region's multi-region manager
pub fn api(state: AppState) -> Router {
    Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(base::about))
        // Decision path hand-off
        .route(paths::HITS, routing::post(hits::queue_hits))
        // Other regions
        .route(paths::region::HITS, routing::post(hits::receive_region_hits))
        .route(paths::region::REMOTE_HITS, routing::get(hits::remote_hits))
        .route(paths::region::REGIONS, routing::get(hits::regions))
        .route(paths::EXPIRE_KEYS, routing::post(hits::expire_keys))
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(Duration::from_secs(10)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}
