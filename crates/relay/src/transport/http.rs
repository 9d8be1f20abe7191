// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the relay.
//!
//! Bodies are taken as raw bytes and parsed here so that every malformed
//! body, whatever the content type, is answered with 400.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::broadcast::BroadcastResult;
use crate::error::{ApiError, RelayError};
use crate::push::encrypt::MAX_PAYLOAD_LEN;
use crate::registry::RegisterOutcome;
use crate::state::RelayState;
use crate::subscription::Subscription;

/// Response header carrying the id of a dispatched broadcast.
pub const BROADCAST_ID_HEADER: &str = "x-broadcast-id";

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub subscription: Subscription,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub subscriptions: usize,
    pub broadcasts: u64,
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| RelayError::BadRequest.with_message(format!("invalid request body: {e}")))
}

// -- Handlers -----------------------------------------------------------------

/// `GET /vapid-public-key`
pub async fn vapid_public_key(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(PublicKeyResponse { public_key: s.credentials.public_key().to_owned() })
}

/// `POST /subscribe` — register (or refresh) a push subscription.
pub async fn subscribe(
    State(s): State<Arc<RelayState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let req: SubscribeRequest = parse_body(&body)?;
    req.subscription.validate().map_err(|e| RelayError::BadRequest.with_message(e))?;

    let endpoint = req.subscription.endpoint.clone();
    match s.registry.register(req.subscription) {
        RegisterOutcome::Created => tracing::info!(%endpoint, "subscription registered"),
        RegisterOutcome::Replaced => tracing::debug!(%endpoint, "subscription re-registered"),
    }
    Ok(StatusCode::OK)
}

/// `POST /unsubscribe`
pub async fn unsubscribe(
    State(s): State<Arc<RelayState>>,
    body: Bytes,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    let req: UnsubscribeRequest = parse_body(&body)?;
    let removed = s.registry.remove(&req.endpoint);
    if removed {
        tracing::info!(endpoint = %req.endpoint, "subscription removed");
    }
    Ok(Json(UnsubscribeResponse { removed }))
}

/// `POST /notify-all` — start a broadcast and return without waiting for it.
pub async fn notify_all(
    State(s): State<Arc<RelayState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: NotifyRequest = parse_body(&body)?;
    if req.message.len() > MAX_PAYLOAD_LEN {
        return Err(RelayError::PayloadTooLarge.with_message(format!(
            "message is {} bytes, limit is {MAX_PAYLOAD_LEN}",
            req.message.len()
        )));
    }

    let handle = s.dispatcher.dispatch(Bytes::from(req.message));
    Ok((StatusCode::OK, [(BROADCAST_ID_HEADER, handle.job_id.to_string())]))
}

/// `GET /health`
pub async fn health(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        subscriptions: s.registry.len(),
        broadcasts: s.dispatcher.dispatched(),
    })
}

/// `GET /broadcasts` — recently completed broadcast tallies, oldest first.
pub async fn broadcasts(State(s): State<Arc<RelayState>>) -> Json<Vec<BroadcastResult>> {
    Json(s.dispatcher.recent())
}
