//! HTTP route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use tower_http::cors::CorsLayer;

use crate::bridge::ScrapeBridge;
use crate::response::ScrapeResponse;

async fn scrape(
    State(bridge): State<Arc<ScrapeBridge>>,
    Query(params): Query<HashMap<String, String>>,
) -> ScrapeResponse {
    bridge.handle(&params).await
}

/// Route table. CORS policy is passed in rather than installed globally.
pub fn routes(bridge: Arc<ScrapeBridge>, cors: bool) -> Router {
    let router = Router::new()
        .route("/scrape", get(scrape))
        .with_state(bridge);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
