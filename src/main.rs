use payouts::config::AppConfig;
use payouts::http::routes::build_router;
use payouts::repo::payouts_repo::PayoutsRepo;
use payouts::service::payout_service::PayoutService;
use payouts::service::resolution_worker::ResolutionWorker;
use payouts::service::webhook_dispatcher::WebhookDispatcher;
use payouts::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_millis(cfg.request_timeout_ms))
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let provider = payouts::providers::from_config(&cfg);
    tracing::info!(provider = provider.name(), "payout provider selected");

    let mut payout_service = PayoutService::new(
        Arc::new(PayoutsRepo { pool: pool.clone() }),
        provider,
        cfg.service_settings(),
    );
    if let Some(target_url) = cfg.webhook_url.clone() {
        payout_service = payout_service.with_webhooks(WebhookDispatcher {
            client: reqwest::Client::new(),
            target_url,
            secret: cfg.webhook_secret.clone(),
            timeout: Duration::from_millis(cfg.provider_timeout_ms),
        });
    }

    let worker = ResolutionWorker {
        service: payout_service.clone(),
        poll_interval: Duration::from_millis(cfg.resolution_poll_ms),
        batch_size: cfg.resolution_batch_size,
    };
    tokio::spawn(worker.run());

    let app = build_router(AppState { payout_service }, cfg.api_key.clone());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
