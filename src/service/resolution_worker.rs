use crate::service::payout_service::PayoutService;
use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Polls the resolution queue and settles each claimed payout in its own task.
#[derive(Clone)]
pub struct ResolutionWorker {
    pub service: PayoutService,
    pub poll_interval: Duration,
    pub batch_size: i64,
}

impl ResolutionWorker {
    pub async fn run(self) {
        loop {
            match self.tick().await {
                Ok(0) => {}
                Ok(resolved) => tracing::debug!(resolved, "resolution tick"),
                Err(err) => tracing::error!("resolution worker error: {:#}", err),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Claims what is due and waits for every claimed job to finish.
    /// Returns how many payouts reached a terminal state.
    pub async fn tick(&self) -> Result<usize> {
        let batch = self
            .service
            .store
            .claim_due_resolutions(self.batch_size, Utc::now())
            .await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tasks = JoinSet::new();
        for job in batch {
            let service = self.service.clone();
            tasks.spawn(async move {
                let payout_id = job.payout_id.clone();
                (payout_id, service.resolve_claimed(job).await)
            });
        }

        let mut resolved = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(true))) => resolved += 1,
                Ok((_, Ok(false))) => {}
                Ok((payout_id, Err(err))) => {
                    tracing::error!(%payout_id, "payout resolution failed: {}", err);
                }
                Err(err) => tracing::error!("resolution task aborted: {}", err),
            }
        }

        Ok(resolved)
    }
}
