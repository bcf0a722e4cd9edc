use crate::domain::event::PayoutEventRecord;
use crate::domain::payout::{PayoutRecord, PayoutStatus};
use crate::repo::store::{JobStatus, PayoutStore, ResolutionJob, TerminalUpdate};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    payouts: HashMap<String, PayoutRecord>,
    insertion_order: Vec<String>,
    events: Vec<PayoutEventRecord>,
    jobs: HashMap<String, ResolutionJob>,
}

/// Process-local store with the same transactional guarantees as the
/// Postgres one: every write takes the single write lock, so each operation
/// is applied whole or not at all.
#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    inner: Arc<RwLock<Inner>>,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl InMemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every mutating call fails without touching state.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// While set, payout and event lookups fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub async fn job(&self, payout_id: &str) -> Option<ResolutionJob> {
        self.inner.read().await.jobs.get(payout_id).cloned()
    }

    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("in-memory store is rejecting writes");
        }
        Ok(())
    }

    fn check_readable(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("in-memory store is rejecting reads");
        }
        Ok(())
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn insert_created(
        &self,
        payout: &PayoutRecord,
        event: &PayoutEventRecord,
        job: &ResolutionJob,
    ) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        if inner.payouts.contains_key(&payout.id) {
            anyhow::bail!("duplicate payout id {}", payout.id);
        }
        inner.payouts.insert(payout.id.clone(), payout.clone());
        inner.insertion_order.push(payout.id.clone());
        inner.events.push(event.clone());
        inner.jobs.insert(job.payout_id.clone(), job.clone());
        Ok(())
    }

    async fn get_payout(&self, id: &str) -> Result<Option<PayoutRecord>> {
        self.check_readable()?;
        Ok(self.inner.read().await.payouts.get(id).cloned())
    }

    async fn list_payouts(&self, limit: i64) -> Result<Vec<PayoutRecord>> {
        self.check_readable()?;
        let inner = self.inner.read().await;
        let mut out: Vec<PayoutRecord> = inner
            .insertion_order
            .iter()
            .rev()
            .filter_map(|id| inner.payouts.get(id).cloned())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    /// Position in the log decides recency, not `created_at`.
    async fn latest_event(&self, payout_id: &str) -> Result<Option<PayoutEventRecord>> {
        self.check_readable()?;
        let inner = self.inner.read().await;
        Ok(inner.events.iter().rev().find(|e| e.payout_id == payout_id).cloned())
    }

    async fn list_events(&self, payout_id: &str) -> Result<Vec<PayoutEventRecord>> {
        self.check_readable()?;
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.payout_id == payout_id)
            .cloned()
            .collect())
    }

    async fn claim_due_resolutions(&self, limit: i64, now: DateTime<Utc>) -> Result<Vec<ResolutionJob>> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        let mut due: Vec<&mut ResolutionJob> = inner
            .jobs
            .values_mut()
            .filter(|job| job.status == JobStatus::Pending && job.due_at <= now)
            .collect();
        due.sort_by_key(|job| job.due_at);

        Ok(due
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|job| {
                job.status = JobStatus::Claimed;
                job.claimed_at = Some(now);
                job.clone()
            })
            .collect())
    }

    async fn complete_resolution(&self, update: &TerminalUpdate, event: &PayoutEventRecord) -> Result<bool> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        let applied = match inner.payouts.get_mut(&update.payout_id) {
            Some(payout) if payout.status == PayoutStatus::Processing => {
                payout.status = update.status;
                payout.utr = update.utr.clone();
                payout.error = update.error.clone();
                payout.updated_at = update.updated_at;
                true
            }
            _ => false,
        };
        if applied {
            inner.events.push(event.clone());
        }
        if let Some(job) = inner.jobs.get_mut(&update.payout_id) {
            job.status = JobStatus::Done;
        }
        Ok(applied)
    }

    async fn record_resolution_error(&self, payout_id: &str, error: &str) -> Result<()> {
        self.check_writable()?;
        if let Some(job) = self.inner.write().await.jobs.get_mut(payout_id) {
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn requeue_stale_claims(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        let Inner { payouts, jobs, .. } = &mut *inner;
        let mut requeued = 0;
        for job in jobs.values_mut() {
            let still_processing = payouts
                .get(&job.payout_id)
                .is_some_and(|p| p.status == PayoutStatus::Processing);
            let stale = job.claimed_at.is_some_and(|at| at < claimed_before);
            if job.status == JobStatus::Claimed && still_processing && stale {
                job.status = JobStatus::Pending;
                job.claimed_at = None;
                job.due_at = Utc::now();
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
