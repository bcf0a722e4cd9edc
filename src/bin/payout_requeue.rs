use anyhow::Result;
use payouts::config::AppConfig;
use payouts::repo::payouts_repo::PayoutsRepo;
use payouts::service::payout_service::PayoutService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Puts resolutions that were claimed by a worker which never finished back
/// into the queue. Run by an operator; the server picks them up on its next poll.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&cfg.database_url)
        .await?;

    let service = PayoutService::new(
        Arc::new(PayoutsRepo { pool }),
        payouts::providers::from_config(&cfg),
        cfg.service_settings(),
    );

    let requeued = service
        .requeue_stale_claims(Duration::from_secs(cfg.requeue_stale_after_secs))
        .await?;
    println!("requeued {requeued} stale payout resolution(s)");
    Ok(())
}
