use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = match state.payout_service.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("store ping failed: {:#}", e);
            false
        }
    };

    let status = if store_ok {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": store_ok,
            "store": store_ok,
            "provider": state.payout_service.provider.name()
        })),
    )
        .into_response()
}
