use crate::domain::event::PayoutEventRecord;
use crate::domain::payout::{PayoutRecord, PayoutStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Claimed,
    Done,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Claimed => "CLAIMED",
            JobStatus::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "CLAIMED" => Some(JobStatus::Claimed),
            "DONE" => Some(JobStatus::Done),
            _ => None,
        }
    }
}

/// One pending settlement check. Written in the same transaction as the
/// payout it belongs to, so a committed payout always has one.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionJob {
    pub payout_id: String,
    pub provider_ref: String,
    pub status: JobStatus,
    pub due_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ResolutionJob {
    pub fn pending(payout_id: &str, provider_ref: &str, due_at: DateTime<Utc>) -> Self {
        Self {
            payout_id: payout_id.to_string(),
            provider_ref: provider_ref.to_string(),
            status: JobStatus::Pending,
            due_at,
            claimed_at: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalUpdate {
    pub payout_id: String,
    pub status: PayoutStatus,
    pub utr: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait PayoutStore: Send + Sync {
    /// Payout row, its first event and its resolution job, all or nothing.
    async fn insert_created(
        &self,
        payout: &PayoutRecord,
        event: &PayoutEventRecord,
        job: &ResolutionJob,
    ) -> Result<()>;

    async fn get_payout(&self, id: &str) -> Result<Option<PayoutRecord>>;

    /// Newest first.
    async fn list_payouts(&self, limit: i64) -> Result<Vec<PayoutRecord>>;

    async fn latest_event(&self, payout_id: &str) -> Result<Option<PayoutEventRecord>>;

    /// Oldest first.
    async fn list_events(&self, payout_id: &str) -> Result<Vec<PayoutEventRecord>>;

    /// Moves up to `limit` pending jobs due at `now` to claimed and returns
    /// them. A job is handed out by at most one call.
    async fn claim_due_resolutions(&self, limit: i64, now: DateTime<Utc>) -> Result<Vec<ResolutionJob>>;

    /// Applies the terminal update only while the payout is still
    /// `processing`, appends `event` when it does, and closes the job.
    /// Returns whether the payout row changed.
    async fn complete_resolution(&self, update: &TerminalUpdate, event: &PayoutEventRecord) -> Result<bool>;

    async fn record_resolution_error(&self, payout_id: &str, error: &str) -> Result<()>;

    /// Puts claimed jobs older than `claimed_before` whose payout is still
    /// `processing` back into the pending queue.
    async fn requeue_stale_claims(&self, claimed_before: DateTime<Utc>) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}
