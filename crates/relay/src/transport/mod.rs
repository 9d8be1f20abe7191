// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the relay.

pub mod http;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Browser-facing push API
        .route("/vapid-public-key", get(http::vapid_public_key))
        .route("/subscribe", post(http::subscribe))
        .route("/unsubscribe", post(http::unsubscribe))
        .route("/notify-all", post(http::notify_all))
        // Operational
        .route("/health", get(http::health))
        .route("/broadcasts", get(http::broadcasts))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
