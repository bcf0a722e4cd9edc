use crate::domain::payout::{CreatePayoutRequest, ErrorEnvelope, ErrorPayload};
use crate::error::PayoutError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

pub async fn create_payout(
    State(state): State<AppState>,
    Json(req): Json<CreatePayoutRequest>,
) -> impl IntoResponse {
    match state.payout_service.create(req).await {
        Ok(resp) => (StatusCode::CREATED, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_payout(State(state): State<AppState>, Path(payout_id): Path<String>) -> impl IntoResponse {
    match state.payout_service.get(&payout_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<String>,
}

pub async fn ledger(State(state): State<AppState>, Query(query): Query<LedgerQuery>) -> impl IntoResponse {
    let limit = query.limit.and_then(|s| s.trim().parse::<i64>().ok());
    match state.payout_service.ledger(limit).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_events(State(state): State<AppState>, Path(payout_id): Path<String>) -> impl IntoResponse {
    match state.payout_service.events(&payout_id).await {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn replay_webhook(State(state): State<AppState>, Path(payout_id): Path<String>) -> impl IntoResponse {
    match state.payout_service.replay_latest_event(&payout_id).await {
        Ok(payload) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], payload).into_response(),
        Err(e) => error_response(e),
    }
}

pub fn error_response(e: PayoutError) -> Response {
    let status = match &e {
        PayoutError::Validation { .. } | PayoutError::Provider(_) => StatusCode::BAD_REQUEST,
        PayoutError::NotFound(_) => StatusCode::NOT_FOUND,
        PayoutError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        PayoutError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if !e.is_client_error() {
        tracing::error!("payout request failed: {}", e);
    }

    (
        status,
        Json(ErrorEnvelope {
            error: ErrorPayload {
                code: e.code().to_string(),
                message: e.to_string(),
                details: None,
            },
        }),
    )
        .into_response()
}
