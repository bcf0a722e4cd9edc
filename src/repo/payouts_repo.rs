use crate::domain::event::PayoutEventRecord;
use crate::domain::payout::{Destination, PayoutMethod, PayoutRecord, PayoutStatus};
use crate::repo::store::{JobStatus, PayoutStore, ResolutionJob, TerminalUpdate};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;

const PAYOUT_COLUMNS: &str = "id, reference_id, amount_cents, currency, method, dest_vpa, dest_account, \
     dest_ifsc, dest_name, status, provider_ref, utr, error, created_at, updated_at";

#[derive(Clone)]
pub struct PayoutsRepo {
    pub pool: PgPool,
}

impl PayoutsRepo {
    async fn insert_payout_tx(tx: &mut Transaction<'_, Postgres>, payout: &PayoutRecord) -> Result<()> {
        let (vpa, account, ifsc) = match &payout.destination {
            Destination::Upi { vpa, .. } => (Some(vpa.as_str()), None, None),
            Destination::Bank { account, ifsc, .. } => (None, Some(account.as_str()), Some(ifsc.as_str())),
        };

        sqlx::query(
            r#"
            INSERT INTO payouts (
                id, reference_id, amount_cents, currency, method,
                dest_vpa, dest_account, dest_ifsc, dest_name,
                status, provider_ref, utr, error, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9,
                $10, $11, $12, $13, $14, $15
            )
            "#,
        )
        .bind(&payout.id)
        .bind(&payout.reference_id)
        .bind(payout.amount_minor)
        .bind(&payout.currency)
        .bind(payout.method().as_str())
        .bind(vpa)
        .bind(account)
        .bind(ifsc)
        .bind(payout.destination.name())
        .bind(payout.status.as_str())
        .bind(&payout.provider_ref)
        .bind(&payout.utr)
        .bind(&payout.error)
        .bind(payout.created_at)
        .bind(payout.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_event_tx(tx: &mut Transaction<'_, Postgres>, event: &PayoutEventRecord) -> Result<()> {
        sqlx::query("INSERT INTO payout_events (id, payout_id, event, payload, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(&event.id)
            .bind(&event.payout_id)
            .bind(&event.event)
            .bind(&event.payload)
            .bind(event.created_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn enqueue_resolution_tx(tx: &mut Transaction<'_, Postgres>, job: &ResolutionJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payout_resolution_jobs (payout_id, provider_ref, status, due_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&job.payout_id)
        .bind(&job.provider_ref)
        .bind(job.status.as_str())
        .bind(job.due_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn payout_from_row(row: &PgRow) -> Result<PayoutRecord> {
    let method: String = row.try_get("method")?;
    let status: String = row.try_get("status")?;
    let name: Option<String> = row.try_get("dest_name")?;
    let destination = match PayoutMethod::from_str(&method).map_err(anyhow::Error::msg)? {
        PayoutMethod::Upi => Destination::Upi {
            vpa: row.try_get::<Option<String>, _>("dest_vpa")?.unwrap_or_default(),
            name,
        },
        PayoutMethod::Bank => Destination::Bank {
            account: row.try_get::<Option<String>, _>("dest_account")?.unwrap_or_default(),
            ifsc: row.try_get::<Option<String>, _>("dest_ifsc")?.unwrap_or_default(),
            name,
        },
    };

    Ok(PayoutRecord {
        id: row.try_get("id")?,
        reference_id: row.try_get("reference_id")?,
        amount_minor: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        destination,
        status: PayoutStatus::parse(&status).with_context(|| format!("unknown payout status {status}"))?,
        provider_ref: row.try_get("provider_ref")?,
        utr: row.try_get("utr")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<PayoutEventRecord> {
    Ok(PayoutEventRecord {
        id: row.try_get("id")?,
        payout_id: row.try_get("payout_id")?,
        event: row.try_get("event")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
    })
}

fn job_from_row(row: &PgRow) -> Result<ResolutionJob> {
    let status: String = row.try_get("status")?;
    Ok(ResolutionJob {
        payout_id: row.try_get("payout_id")?,
        provider_ref: row.try_get("provider_ref")?,
        status: JobStatus::parse(&status).with_context(|| format!("unknown job status {status}"))?,
        due_at: row.try_get("due_at")?,
        claimed_at: row.try_get("claimed_at")?,
        last_error: row.try_get("last_error")?,
    })
}

#[async_trait]
impl PayoutStore for PayoutsRepo {
    async fn insert_created(
        &self,
        payout: &PayoutRecord,
        event: &PayoutEventRecord,
        job: &ResolutionJob,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_payout_tx(&mut tx, payout).await?;
        Self::insert_event_tx(&mut tx, event).await?;
        Self::enqueue_resolution_tx(&mut tx, job).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_payout(&self, id: &str) -> Result<Option<PayoutRecord>> {
        let row = sqlx::query(&format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(payout_from_row).transpose()
    }

    async fn list_payouts(&self, limit: i64) -> Result<Vec<PayoutRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts ORDER BY created_at DESC, seq DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payout_from_row).collect()
    }

    async fn latest_event(&self, payout_id: &str) -> Result<Option<PayoutEventRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, payout_id, event, payload, created_at
            FROM payout_events
            WHERE payout_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(payout_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn list_events(&self, payout_id: &str) -> Result<Vec<PayoutEventRecord>> {
        let rows = sqlx::query(
            "SELECT id, payout_id, event, payload, created_at FROM payout_events WHERE payout_id = $1 ORDER BY seq ASC",
        )
        .bind(payout_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn claim_due_resolutions(&self, limit: i64, now: DateTime<Utc>) -> Result<Vec<ResolutionJob>> {
        let rows = sqlx::query(
            r#"
            UPDATE payout_resolution_jobs
            SET status = 'CLAIMED', claimed_at = $2, updated_at = now()
            WHERE payout_id IN (
                SELECT payout_id
                FROM payout_resolution_jobs
                WHERE status = 'PENDING' AND due_at <= $2
                ORDER BY due_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING payout_id, provider_ref, status, due_at, claimed_at, last_error
            "#,
        )
        .bind(limit)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn complete_resolution(&self, update: &TerminalUpdate, event: &PayoutEventRecord) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let applied = sqlx::query(
            r#"
            UPDATE payouts
            SET status = $2, utr = $3, error = $4, updated_at = $5
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(&update.payout_id)
        .bind(update.status.as_str())
        .bind(&update.utr)
        .bind(&update.error)
        .bind(update.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if applied {
            Self::insert_event_tx(&mut tx, event).await?;
        }

        sqlx::query(
            "UPDATE payout_resolution_jobs SET status = 'DONE', completed_at = now(), updated_at = now() WHERE payout_id = $1",
        )
        .bind(&update.payout_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(applied)
    }

    async fn record_resolution_error(&self, payout_id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE payout_resolution_jobs SET last_error = $2, updated_at = now() WHERE payout_id = $1")
            .bind(payout_id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn requeue_stale_claims(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE payout_resolution_jobs j
            SET status = 'PENDING', claimed_at = NULL, due_at = now(), updated_at = now()
            FROM payouts p
            WHERE p.id = j.payout_id
              AND p.status = 'processing'
              AND j.status = 'CLAIMED'
              AND j.claimed_at < $1
            "#,
        )
        .bind(claimed_before)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
