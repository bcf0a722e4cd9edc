use crate::domain::payout::PayoutStatus;
use crate::providers::{PayoutProvider, ProviderAck, ProviderPayoutRequest, Resolution};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use std::sync::Mutex;

pub const SUCCESS_PERCENT: u32 = 92;
pub const FAILURE_REASON: &str = "mock_failure";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Random,
    AlwaysSuccess,
    AlwaysFailure,
    RejectCreate,
}

impl FromStr for MockBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RANDOM" => Ok(MockBehavior::Random),
            "ALWAYS_SUCCESS" => Ok(MockBehavior::AlwaysSuccess),
            "ALWAYS_FAILURE" => Ok(MockBehavior::AlwaysFailure),
            "REJECT_CREATE" => Ok(MockBehavior::RejectCreate),
            other => Err(format!("unknown mock behavior {other}")),
        }
    }
}

/// Network-free provider. Outcomes come from an injected seeded generator so
/// a given seed always produces the same success/failure sequence.
pub struct MockProvider {
    pub behavior: MockBehavior,
    rng: Mutex<StdRng>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior, seed: u64) -> Self {
        Self {
            behavior,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn roll(&self) -> (bool, u64) {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let succeeded = rng.gen_range(0..100) < SUCCESS_PERCENT;
        let utr = 1_000_000_000 + rng.gen_range(0..899_999_999u64);
        (succeeded, utr)
    }
}

#[async_trait::async_trait]
impl PayoutProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_payout(&self, request: ProviderPayoutRequest) -> Result<ProviderAck> {
        if self.behavior == MockBehavior::RejectCreate {
            anyhow::bail!(
                "mock provider rejected {} payout of {} minor units",
                request.method.as_str(),
                request.amount_minor
            );
        }

        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Ok(ProviderAck {
            provider_ref: format!("mock_{nanos}"),
            status: PayoutStatus::Processing,
        })
    }

    async fn resolve(&self, _provider_ref: &str) -> Resolution {
        let (succeeded, utr) = self.roll();
        let succeeded = match self.behavior {
            MockBehavior::AlwaysSuccess => true,
            MockBehavior::AlwaysFailure => false,
            MockBehavior::Random | MockBehavior::RejectCreate => succeeded,
        };

        if succeeded {
            Resolution::success(utr.to_string())
        } else {
            Resolution::failed(FAILURE_REASON)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payout::PayoutMethod;
    use std::collections::BTreeMap;

    fn request() -> ProviderPayoutRequest {
        ProviderPayoutRequest {
            amount_minor: 150000,
            currency: "INR".to_string(),
            method: PayoutMethod::Upi,
            destination: BTreeMap::from([("vpa".to_string(), "a@bank".to_string())]),
            reference_id: None,
        }
    }

    #[tokio::test]
    async fn create_acknowledges_with_processing() {
        let provider = MockProvider::new(MockBehavior::Random, 7);
        let ack = provider.create_payout(request()).await.unwrap();
        assert_eq!(ack.status, PayoutStatus::Processing);
        assert!(ack.provider_ref.starts_with("mock_"));
    }

    #[tokio::test]
    async fn reject_create_fails_creation() {
        let provider = MockProvider::new(MockBehavior::RejectCreate, 7);
        assert!(provider.create_payout(request()).await.is_err());
    }

    #[tokio::test]
    async fn same_seed_gives_same_outcomes() {
        let a = MockProvider::new(MockBehavior::Random, 42);
        let b = MockProvider::new(MockBehavior::Random, 42);
        for _ in 0..50 {
            assert_eq!(a.resolve("r").await, b.resolve("r").await);
        }
    }

    #[tokio::test]
    async fn random_outcomes_are_mostly_successful() {
        let provider = MockProvider::new(MockBehavior::Random, 1234);
        let mut successes = 0;
        for _ in 0..2000 {
            let res = provider.resolve("r").await;
            match res.status {
                PayoutStatus::Success => {
                    let utr = res.utr.unwrap();
                    assert_eq!(utr.len(), 10);
                    assert!(utr.chars().all(|c| c.is_ascii_digit()));
                    successes += 1;
                }
                PayoutStatus::Failed => {
                    assert_eq!(res.utr, None);
                    assert_eq!(res.failure_reason.as_deref(), Some(FAILURE_REASON));
                }
                PayoutStatus::Processing => panic!("resolution must be terminal"),
            }
        }
        assert!((1760..=1920).contains(&successes), "successes = {successes}");
    }

    #[tokio::test]
    async fn forced_behaviors_pin_the_branch() {
        let ok = MockProvider::new(MockBehavior::AlwaysSuccess, 1);
        let bad = MockProvider::new(MockBehavior::AlwaysFailure, 1);
        for _ in 0..20 {
            assert_eq!(ok.resolve("r").await.status, PayoutStatus::Success);
            assert_eq!(bad.resolve("r").await.status, PayoutStatus::Failed);
        }
    }

    #[test]
    fn parses_behavior_names() {
        assert_eq!("always_failure".parse::<MockBehavior>(), Ok(MockBehavior::AlwaysFailure));
        assert!("sometimes".parse::<MockBehavior>().is_err());
    }
}
