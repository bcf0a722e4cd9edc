use crate::domain::payout::{PayoutMethod, PayoutStatus};
use crate::providers::{PayoutProvider, ProviderAck, ProviderPayoutRequest, Resolution};
use anyhow::{Context, Result};
use serde_json::json;

pub struct RazorpayXProvider {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub account_number: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

/// Maps a RazorpayX payout status onto the initial state we accept.
pub fn initial_status(rail_status: &str) -> Option<PayoutStatus> {
    match rail_status {
        "queued" | "pending" | "processing" => Some(PayoutStatus::Processing),
        _ => None,
    }
}

pub fn resolution_from_body(body: &serde_json::Value) -> Resolution {
    let status = body.get("status").and_then(|s| s.as_str()).unwrap_or("unknown");
    match status {
        "processed" => match body.get("utr").and_then(|u| u.as_str()) {
            Some(utr) if !utr.is_empty() => Resolution::success(utr),
            _ => Resolution::failed("processed_without_utr"),
        },
        other => {
            let reason = body
                .pointer("/status_details/description")
                .and_then(|d| d.as_str())
                .map(|d| format!("{other}: {d}"))
                .unwrap_or_else(|| other.to_string());
            Resolution::failed(reason)
        }
    }
}

fn fund_account(request: &ProviderPayoutRequest) -> serde_json::Value {
    let dest = |key: &str| request.destination.get(key).cloned().unwrap_or_default();
    let name = dest("name");
    match request.method {
        PayoutMethod::Upi => json!({
            "account_type": "vpa",
            "vpa": { "address": dest("vpa") },
            "contact": { "name": name },
        }),
        PayoutMethod::Bank => json!({
            "account_type": "bank_account",
            "bank_account": {
                "name": name,
                "ifsc": dest("ifsc"),
                "account_number": dest("account"),
            },
            "contact": { "name": name },
        }),
    }
}

#[async_trait::async_trait]
impl PayoutProvider for RazorpayXProvider {
    fn name(&self) -> &'static str {
        "razorpayx"
    }

    async fn create_payout(&self, request: ProviderPayoutRequest) -> Result<ProviderAck> {
        let url = format!("{}/v1/payouts", self.base_url);
        let mode = match request.method {
            PayoutMethod::Upi => "UPI",
            PayoutMethod::Bank => "IMPS",
        };
        let body = json!({
            "account_number": self.account_number,
            "amount": request.amount_minor,
            "currency": request.currency,
            "mode": mode,
            "purpose": "payout",
            "fund_account": fund_account(&request),
            "queue_if_low_balance": true,
            "reference_id": request.reference_id,
        });

        let resp = self
            .client
            .post(url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .header("X-Payout-Idempotency", uuid::Uuid::new_v4().to_string())
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .context("razorpayx create payout request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "razorpayx rejected payout: HTTP_{} {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            );
        }

        let v: serde_json::Value = resp.json().await.context("razorpayx returned invalid json")?;
        let provider_ref = v
            .get("id")
            .and_then(|id| id.as_str())
            .map(ToString::to_string)
            .context("razorpayx response missing payout id")?;
        let rail_status = v.get("status").and_then(|s| s.as_str()).unwrap_or("unknown");
        let status = initial_status(rail_status)
            .with_context(|| format!("razorpayx payout {provider_ref} started in status {rail_status}"))?;

        Ok(ProviderAck { provider_ref, status })
    }

    async fn resolve(&self, provider_ref: &str) -> Resolution {
        let url = format!("{}/v1/payouts/{}", self.base_url, provider_ref);
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => match r.json::<serde_json::Value>().await {
                Ok(body) => resolution_from_body(&body),
                Err(e) => Resolution::failed(format!("invalid_response: {e}")),
            },
            Ok(r) => Resolution::failed(format!("HTTP_{}", r.status().as_u16())),
            Err(e) if e.is_timeout() => Resolution::failed("TIMEOUT"),
            Err(e) => Resolution::failed(format!("NETWORK_ERROR: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_statuses_start_processing() {
        assert_eq!(initial_status("queued"), Some(PayoutStatus::Processing));
        assert_eq!(initial_status("processing"), Some(PayoutStatus::Processing));
        assert_eq!(initial_status("rejected"), None);
    }

    #[test]
    fn processed_with_utr_is_success() {
        let res = resolution_from_body(&json!({"id": "pout_1", "status": "processed", "utr": "933815383814"}));
        assert_eq!(res, Resolution::success("933815383814"));
    }

    #[test]
    fn anything_else_is_failed_with_reason() {
        let res = resolution_from_body(&json!({
            "status": "reversed",
            "status_details": {"description": "beneficiary bank offline"}
        }));
        assert_eq!(res.status, PayoutStatus::Failed);
        assert_eq!(res.failure_reason.as_deref(), Some("reversed: beneficiary bank offline"));

        let still_pending = resolution_from_body(&json!({"status": "processing"}));
        assert_eq!(still_pending.status, PayoutStatus::Failed);
    }
}
