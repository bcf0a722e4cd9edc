use crate::http::handlers::{ops, payouts};
use crate::http::middleware::api_key::require_api_key;
use crate::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

pub fn build_router(state: AppState, api_key: String) -> Router {
    let api = Router::new()
        .route("/health", get(ops::health))
        .route("/ready", get(ops::readiness))
        .route("/payouts", post(payouts::create_payout))
        .route("/payouts/ledger", get(payouts::ledger))
        .route("/payouts/:id", get(payouts::get_payout))
        .route("/payouts/:id/events", get(payouts::list_events))
        .route("/payouts/:id/webhook/replay", post(payouts::replay_webhook))
        .layer(from_fn_with_state(api_key, require_api_key));

    Router::new()
        .route("/health", get(ops::health))
        .nest("/api", api)
        .with_state(state)
}
