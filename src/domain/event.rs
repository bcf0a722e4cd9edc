use crate::domain::payout::{new_event_id, to_major_units, PayoutMethod, PayoutRecord, PayoutStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Processing,
    Success,
    Failed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Processing => "payout.processing",
            EventKind::Success => "payout.success",
            EventKind::Failed => "payout.failed",
        }
    }

    pub fn for_status(status: PayoutStatus) -> Self {
        match status {
            PayoutStatus::Processing => EventKind::Processing,
            PayoutStatus::Success => EventKind::Success,
            PayoutStatus::Failed => EventKind::Failed,
        }
    }
}

/// A row of the append-only ledger. `payload` is kept as the exact text that
/// was written so replays hand it back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutEventRecord {
    pub id: String,
    pub payout_id: String,
    pub event: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutEventPayload {
    pub event: String,
    pub payout_id: String,
    pub status: PayoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub method: PayoutMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl PayoutEventRecord {
    /// Snapshots `payout` as it stands into a new event of the kind matching
    /// its status.
    pub fn snapshot(payout: &PayoutRecord) -> Result<Self, serde_json::Error> {
        let kind = EventKind::for_status(payout.status);
        let payload = PayoutEventPayload {
            event: kind.as_str().to_string(),
            payout_id: payout.id.clone(),
            status: payout.status,
            reference_id: payout.reference_id.clone(),
            amount: to_major_units(payout.amount_minor),
            currency: payout.currency.clone(),
            method: payout.method(),
            utr: payout.utr.clone(),
            error: payout.error.clone(),
            occurred_at: payout.updated_at,
        };

        Ok(Self {
            id: new_event_id(),
            payout_id: payout.id.clone(),
            event: kind.as_str().to_string(),
            payload: serde_json::to_string(&payload)?,
            created_at: payout.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payout::Destination;

    #[test]
    fn snapshot_kind_follows_status() {
        let now = Utc::now();
        let mut payout = PayoutRecord {
            id: "po_1".to_string(),
            reference_id: None,
            amount_minor: 19999,
            currency: "INR".to_string(),
            destination: Destination::Upi {
                vpa: "a@bank".to_string(),
                name: None,
            },
            status: PayoutStatus::Processing,
            provider_ref: "mock_1".to_string(),
            utr: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let created = PayoutEventRecord::snapshot(&payout).unwrap();
        assert_eq!(created.event, "payout.processing");
        assert!(created.id.starts_with("evt_"));

        payout.status = PayoutStatus::Success;
        payout.utr = Some("1234567890".to_string());
        let settled = PayoutEventRecord::snapshot(&payout).unwrap();
        assert_eq!(settled.event, "payout.success");

        let body: serde_json::Value = serde_json::from_str(&settled.payload).unwrap();
        assert_eq!(body["payout_id"], "po_1");
        assert_eq!(body["status"], "success");
        assert_eq!(body["utr"], "1234567890");
    }
}
