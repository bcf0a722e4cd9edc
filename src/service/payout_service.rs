use crate::domain::event::PayoutEventRecord;
use crate::domain::payout::{
    new_payout_id, CreatePayoutRequest, CreatePayoutResponse, LedgerEntry, PayoutRecord, PayoutStatus, PayoutView,
    ValidatedPayout,
};
use crate::error::PayoutError;
use crate::providers::{PayoutProvider, ProviderPayoutRequest, Resolution};
use crate::repo::store::{PayoutStore, ResolutionJob, TerminalUpdate};
use crate::service::webhook_dispatcher::WebhookDispatcher;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LEDGER_LIMIT: i64 = 50;
pub const MAX_LEDGER_LIMIT: i64 = 200;
pub const GENERIC_FAILURE_REASON: &str = "provider_failure";

/// Out-of-range or missing limits fall back to the default instead of erroring.
pub fn clamp_ledger_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(n) if (1..=MAX_LEDGER_LIMIT).contains(&n) => n,
        _ => DEFAULT_LEDGER_LIMIT,
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// How long after creation a payout becomes eligible for resolution.
    pub settlement_delay: Duration,
    /// Bounds the provider call plus the create transaction.
    pub request_timeout: Duration,
    /// Bounds the provider's resolve call.
    pub resolution_timeout: Duration,
    /// Advisory, only echoed back to the caller.
    pub expected_settlement: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            settlement_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            resolution_timeout: Duration::from_secs(10),
            expected_settlement: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutEventView {
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Clone)]
pub struct PayoutService {
    pub store: Arc<dyn PayoutStore>,
    pub provider: Arc<dyn PayoutProvider>,
    pub webhook_dispatcher: Option<WebhookDispatcher>,
    pub settings: ServiceSettings,
}

impl PayoutService {
    pub fn new(store: Arc<dyn PayoutStore>, provider: Arc<dyn PayoutProvider>, settings: ServiceSettings) -> Self {
        Self {
            store,
            provider,
            webhook_dispatcher: None,
            settings,
        }
    }

    pub fn with_webhooks(mut self, dispatcher: WebhookDispatcher) -> Self {
        self.webhook_dispatcher = Some(dispatcher);
        self
    }

    /// Validates, hands the payout to the provider and persists it. Returns
    /// as soon as the payout is durably `processing`; settlement happens later
    /// in the resolution worker.
    pub async fn create(&self, req: CreatePayoutRequest) -> Result<CreatePayoutResponse, PayoutError> {
        let payout = req.validate()?;
        match tokio::time::timeout(self.settings.request_timeout, self.create_validated(payout)).await {
            Ok(result) => result,
            Err(_) => Err(PayoutError::Timeout("creating payout")),
        }
    }

    async fn create_validated(&self, payout: ValidatedPayout) -> Result<CreatePayoutResponse, PayoutError> {
        let ack = self
            .provider
            .create_payout(ProviderPayoutRequest {
                amount_minor: payout.amount_minor,
                currency: payout.currency.clone(),
                method: payout.method(),
                destination: payout.destination.to_provider_map(),
                reference_id: payout.reference_id.clone(),
            })
            .await
            .map_err(|e| PayoutError::Provider(format!("{e:#}")))?;

        if ack.status != PayoutStatus::Processing {
            return Err(PayoutError::Provider(format!(
                "{} acknowledged payout {} in status {}",
                self.provider.name(),
                ack.provider_ref,
                ack.status.as_str()
            )));
        }

        let now = Utc::now();
        let record = PayoutRecord {
            id: new_payout_id(),
            reference_id: payout.reference_id,
            amount_minor: payout.amount_minor,
            currency: payout.currency,
            destination: payout.destination,
            status: ack.status,
            provider_ref: ack.provider_ref,
            utr: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        let event = PayoutEventRecord::snapshot(&record).map_err(|e| PayoutError::Store(e.into()))?;
        let job = ResolutionJob::pending(&record.id, &record.provider_ref, now + to_chrono(self.settings.settlement_delay));

        self.store
            .insert_created(&record, &event, &job)
            .await
            .map_err(PayoutError::Store)?;

        tracing::info!(
            payout_id = %record.id,
            provider = self.provider.name(),
            provider_ref = %record.provider_ref,
            amount_minor = record.amount_minor,
            method = record.method().as_str(),
            "payout accepted"
        );

        Ok(CreatePayoutResponse {
            payout_id: record.id,
            status: record.status,
            reference_id: record.reference_id,
            expected_settlement: now + to_chrono(self.settings.expected_settlement),
        })
    }

    pub async fn get(&self, payout_id: &str) -> Result<PayoutView, PayoutError> {
        self.store
            .get_payout(payout_id)
            .await
            .map_err(PayoutError::Store)?
            .map(|record| PayoutView::from(&record))
            .ok_or_else(|| PayoutError::NotFound(payout_id.to_string()))
    }

    pub async fn ledger(&self, limit: Option<i64>) -> Result<Vec<LedgerEntry>, PayoutError> {
        let rows = self
            .store
            .list_payouts(clamp_ledger_limit(limit))
            .await
            .map_err(PayoutError::Store)?;
        Ok(rows.iter().map(LedgerEntry::from).collect())
    }

    /// Raw payload of the newest event, exactly as it was stored.
    pub async fn replay_latest_event(&self, payout_id: &str) -> Result<String, PayoutError> {
        self.store
            .latest_event(payout_id)
            .await
            .map_err(PayoutError::Store)?
            .map(|event| event.payload)
            .ok_or_else(|| PayoutError::NotFound(payout_id.to_string()))
    }

    pub async fn events(&self, payout_id: &str) -> Result<Vec<PayoutEventView>, PayoutError> {
        if self.store.get_payout(payout_id).await.map_err(PayoutError::Store)?.is_none() {
            return Err(PayoutError::NotFound(payout_id.to_string()));
        }
        let events = self.store.list_events(payout_id).await.map_err(PayoutError::Store)?;
        Ok(events
            .into_iter()
            .map(|e| PayoutEventView {
                payload: serde_json::from_str(&e.payload).unwrap_or(serde_json::Value::String(e.payload)),
                event_id: e.id,
                event: e.event,
                created_at: e.created_at,
            })
            .collect())
    }

    /// Settles one claimed job. Never retried here: a store error leaves the
    /// payout `processing` with the error noted on its job.
    /// Returns whether this call moved the payout to a terminal state.
    pub async fn resolve_claimed(&self, job: ResolutionJob) -> Result<bool, PayoutError> {
        let resolution = match tokio::time::timeout(
            self.settings.resolution_timeout,
            self.provider.resolve(&job.provider_ref),
        )
        .await
        {
            Ok(resolution) => resolution,
            Err(_) => Resolution::failed("provider_timeout"),
        };

        let current = match self.store.get_payout(&job.payout_id).await {
            Ok(Some(current)) => current,
            Ok(None) => return Err(PayoutError::NotFound(job.payout_id.clone())),
            Err(err) => return Err(self.note_resolution_error(&job.payout_id, err).await),
        };

        let mut settled = current;
        settled.updated_at = Utc::now();
        if resolution.status == PayoutStatus::Success {
            settled.status = PayoutStatus::Success;
            settled.utr = resolution.utr;
            settled.error = None;
        } else {
            settled.status = PayoutStatus::Failed;
            settled.utr = None;
            settled.error = Some(
                resolution
                    .failure_reason
                    .unwrap_or_else(|| GENERIC_FAILURE_REASON.to_string()),
            );
        }

        let event = PayoutEventRecord::snapshot(&settled).map_err(|e| PayoutError::Store(e.into()))?;
        let update = TerminalUpdate {
            payout_id: settled.id.clone(),
            status: settled.status,
            utr: settled.utr.clone(),
            error: settled.error.clone(),
            updated_at: settled.updated_at,
        };

        let applied = match self.store.complete_resolution(&update, &event).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.note_resolution_error(&job.payout_id, err).await),
        };

        if !applied {
            tracing::warn!(payout_id = %job.payout_id, "payout already terminal, resolution skipped");
            return Ok(false);
        }

        tracing::info!(
            payout_id = %settled.id,
            status = settled.status.as_str(),
            utr = settled.utr.as_deref().unwrap_or(""),
            "payout resolved"
        );

        if let Some(dispatcher) = &self.webhook_dispatcher {
            if let Err(err) = dispatcher.emit(&event.event, &event.payload).await {
                tracing::warn!(payout_id = %settled.id, "webhook delivery failed: {:#}", err);
            }
        }

        Ok(true)
    }

    /// Leaves the job claimed with the store error on it for an operator to requeue.
    async fn note_resolution_error(&self, payout_id: &str, err: anyhow::Error) -> PayoutError {
        if let Err(note_err) = self
            .store
            .record_resolution_error(payout_id, &format!("{err:#}"))
            .await
        {
            tracing::warn!(%payout_id, "could not note resolution error: {:#}", note_err);
        }
        PayoutError::Store(err)
    }

    /// Manual recovery for jobs whose worker died mid-resolution.
    pub async fn requeue_stale_claims(&self, older_than: Duration) -> Result<u64, PayoutError> {
        let cutoff = Utc::now() - to_chrono(older_than);
        let requeued = self
            .store
            .requeue_stale_claims(cutoff)
            .await
            .map_err(PayoutError::Store)?;
        tracing::info!(requeued, "stale resolution claims requeued");
        Ok(requeued)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}
