use crate::domain::payout::{PayoutMethod, PayoutStatus};
use anyhow::Result;
use std::collections::BTreeMap;

pub mod mock;
pub mod razorpayx;

#[derive(Debug, Clone)]
pub struct ProviderPayoutRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub method: PayoutMethod,
    pub destination: BTreeMap<String, String>,
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAck {
    pub provider_ref: String,
    pub status: PayoutStatus,
}

/// Final word from the rail. Anything other than `Success` is a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub status: PayoutStatus,
    pub utr: Option<String>,
    pub failure_reason: Option<String>,
}

impl Resolution {
    pub fn success(utr: impl Into<String>) -> Self {
        Self {
            status: PayoutStatus::Success,
            utr: Some(utr.into()),
            failure_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: PayoutStatus::Failed,
            utr: None,
            failure_reason: Some(reason.into()),
        }
    }
}

#[async_trait::async_trait]
pub trait PayoutProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_payout(&self, request: ProviderPayoutRequest) -> Result<ProviderAck>;

    /// Has no error channel: transport or rail errors come back as a failed
    /// resolution.
    async fn resolve(&self, provider_ref: &str) -> Resolution;
}

/// Picks the provider variant at wiring time.
pub fn from_config(cfg: &crate::config::AppConfig) -> std::sync::Arc<dyn PayoutProvider> {
    match cfg.provider {
        crate::config::ProviderKind::RazorpayX => std::sync::Arc::new(razorpayx::RazorpayXProvider {
            base_url: cfg.razorpayx_base_url.clone(),
            key_id: cfg.razorpayx_key_id.clone(),
            key_secret: cfg.razorpayx_key_secret.clone(),
            account_number: cfg.razorpayx_account_number.clone(),
            timeout_ms: cfg.provider_timeout_ms,
            client: reqwest::Client::new(),
        }),
        crate::config::ProviderKind::Mock => {
            let behavior = cfg.mock_behavior.parse::<mock::MockBehavior>().unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to RANDOM", e);
                mock::MockBehavior::Random
            });
            match cfg.mock_seed {
                Some(seed) => std::sync::Arc::new(mock::MockProvider::new(behavior, seed)),
                None => std::sync::Arc::new(mock::MockProvider::from_entropy(behavior)),
            }
        }
    }
}
