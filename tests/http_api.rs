use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use payouts::http::routes::build_router;
use payouts::providers::mock::{MockBehavior, MockProvider};
use payouts::repo::in_memory::InMemoryPayoutStore;
use payouts::repo::store::PayoutStore;
use payouts::service::payout_service::{PayoutService, ServiceSettings};
use payouts::service::resolution_worker::ResolutionWorker;
use payouts::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const KEY: &str = "test-key";

fn setup(behavior: MockBehavior) -> (Router, PayoutService, InMemoryPayoutStore) {
    let store = InMemoryPayoutStore::new();
    let payout_service = PayoutService::new(
        Arc::new(store.clone()),
        Arc::new(MockProvider::new(behavior, 5)),
        ServiceSettings {
            settlement_delay: Duration::ZERO,
            ..ServiceSettings::default()
        },
    );
    let app = build_router(
        AppState {
            payout_service: payout_service.clone(),
        },
        KEY.to_string(),
    );
    (app, payout_service, store)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri).header("X-Api-Key", KEY);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn json_of(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn api_routes_require_key_but_health_is_public() {
    let (app, _, _) = setup(MockBehavior::Random);

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/api/payouts/ledger").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, body) = call(&app, "GET", "/api/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["ready"], true);
}

#[tokio::test]
async fn create_then_get_then_settle() {
    let (app, svc, store) = setup(MockBehavior::AlwaysSuccess);

    let (status, body) = call(
        &app,
        "POST",
        "/api/payouts",
        Some(json!({
            "amount": 199.99,
            "currency": "INR",
            "method": "upi",
            "upi": {"vpa": "a@bank", "name": "Asha"},
            "reference_id": "inv-9"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_of(&body);
    assert_eq!(created["status"], "processing");
    assert_eq!(created["reference_id"], "inv-9");
    assert!(created["expected_settlement"].is_string());
    let id = created["payout_id"].as_str().unwrap().to_string();
    assert!(id.starts_with("po_"));

    assert_eq!(store.get_payout(&id).await.unwrap().unwrap().amount_minor, 19999);

    let (status, body) = call(&app, "GET", &format!("/api/payouts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let view = json_of(&body);
    assert_eq!(view["status"], "processing");
    assert_eq!(view["method"], "upi");
    assert!(view.as_object().unwrap().contains_key("utr"));
    assert!(view["utr"].is_null());
    assert!((view["amount"].as_f64().unwrap() - 199.99).abs() < 1e-9);

    ResolutionWorker {
        service: svc,
        poll_interval: Duration::from_millis(10),
        batch_size: 10,
    }
    .tick()
    .await
    .unwrap();

    let (_, body) = call(&app, "GET", &format!("/api/payouts/{id}"), None).await;
    let view = json_of(&body);
    assert_eq!(view["status"], "success");
    assert!(view["utr"].as_str().unwrap().chars().all(|c| c.is_ascii_digit()));
    assert!(view["processed_at"].is_string());

    let (status, body) = call(&app, "POST", &format!("/api/payouts/{id}/webhook/replay"), None).await;
    assert_eq!(status, StatusCode::OK);
    let latest = store.latest_event(&id).await.unwrap().unwrap();
    assert_eq!(body, latest.payload.into_bytes());

    let (status, body) = call(&app, "GET", &format!("/api/payouts/{id}/events"), None).await;
    assert_eq!(status, StatusCode::OK);
    let events = json_of(&body);
    assert_eq!(events.as_array().unwrap().len(), 2);
    assert_eq!(events[0]["event"], "payout.processing");
    assert_eq!(events[1]["payload"]["status"], "success");
}

#[tokio::test]
async fn usd_is_a_client_error_mentioning_currency() {
    let (app, _, _) = setup(MockBehavior::Random);

    let (status, body) = call(
        &app,
        "POST",
        "/api/payouts",
        Some(json!({"amount": 10, "currency": "USD", "method": "upi", "upi": {"vpa": "a@bank"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err = json_of(&body);
    assert_eq!(err["error"]["code"], "INVALID_CURRENCY");
    assert!(err["error"]["message"].as_str().unwrap().contains("currency"));

    let (status, body) = call(&app, "GET", "/api/payouts/po_fabricated", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_of(&body)["error"]["code"], "NOT_FOUND");

    let (status, _) = call(&app, "POST", "/api/payouts/po_fabricated/webhook/replay", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ledger_limit_parameter_clamps() {
    let (app, _, _) = setup(MockBehavior::Random);

    for i in 0..52 {
        let (status, _) = call(
            &app,
            "POST",
            "/api/payouts",
            Some(json!({
                "amount": 1 + i,
                "method": "bank",
                "bank": {"account": "50100012345678", "ifsc": "HDFC0000123"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    for (query, expected) in [("?limit=500", 50), ("?limit=0", 50), ("?limit=-1", 50), ("?limit=abc", 50), ("", 50), ("?limit=2", 2)] {
        let (status, body) = call(&app, "GET", &format!("/api/payouts/ledger{query}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = json_of(&body);
        assert_eq!(rows.as_array().unwrap().len(), expected, "query {query}");
    }

    let (_, body) = call(&app, "GET", "/api/payouts/ledger?limit=1", None).await;
    let newest = &json_of(&body)[0];
    assert_eq!(newest["method"], "bank");
    assert_eq!(newest["utr"], "");
    assert_eq!(newest["status"], "processing");
    assert_eq!(newest["amount"].as_f64(), Some(52.0));
}
