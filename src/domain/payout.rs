use crate::error::PayoutError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

pub const SUPPORTED_CURRENCY: &str = "INR";
pub const PAYOUT_ID_PREFIX: &str = "po_";
pub const EVENT_ID_PREFIX: &str = "evt_";

pub fn new_payout_id() -> String {
    format!("{}{}", PAYOUT_ID_PREFIX, Uuid::new_v4())
}

pub fn new_event_id() -> String {
    format!("{}{}", EVENT_ID_PREFIX, Uuid::new_v4())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMethod {
    Upi,
    Bank,
}

impl PayoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::Upi => "upi",
            PayoutMethod::Bank => "bank",
        }
    }
}

impl FromStr for PayoutMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upi" => Ok(PayoutMethod::Upi),
            "bank" => Ok(PayoutMethod::Bank),
            other => Err(format!("invalid method {other:?}, expected \"upi\" or \"bank\"")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Processing,
    Success,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Processing => "processing",
            PayoutStatus::Success => "success",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Processing)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(PayoutStatus::Processing),
            "success" => Some(PayoutStatus::Success),
            "failed" => Some(PayoutStatus::Failed),
            _ => None,
        }
    }
}

/// Where the money goes. Exactly one shape exists per payout and it always
/// matches the payout's method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Upi {
        vpa: String,
        name: Option<String>,
    },
    Bank {
        account: String,
        ifsc: String,
        name: Option<String>,
    },
}

impl Destination {
    pub fn method(&self) -> PayoutMethod {
        match self {
            Destination::Upi { .. } => PayoutMethod::Upi,
            Destination::Bank { .. } => PayoutMethod::Bank,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Destination::Upi { name, .. } | Destination::Bank { name, .. } => name.as_deref(),
        }
    }

    pub fn to_provider_map(&self) -> BTreeMap<String, String> {
        let mut dest = BTreeMap::new();
        match self {
            Destination::Upi { vpa, .. } => {
                dest.insert("vpa".to_string(), vpa.clone());
            }
            Destination::Bank { account, ifsc, .. } => {
                dest.insert("account".to_string(), account.clone());
                dest.insert("ifsc".to_string(), ifsc.clone());
            }
        }
        if let Some(name) = self.name() {
            dest.insert("name".to_string(), name.to_string());
        }
        dest
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpiDestination {
    #[serde(default)]
    pub vpa: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankDestination {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub ifsc: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayoutRequest {
    /// Major currency units, e.g. rupees.
    pub amount: Decimal,
    #[serde(default)]
    pub currency: String,
    pub method: String,
    #[serde(default)]
    pub upi: Option<UpiDestination>,
    #[serde(default)]
    pub bank: Option<BankDestination>,
    #[serde(default)]
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayout {
    pub amount_minor: i64,
    pub currency: String,
    pub destination: Destination,
    pub reference_id: Option<String>,
}

impl ValidatedPayout {
    pub fn method(&self) -> PayoutMethod {
        self.destination.method()
    }
}

impl CreatePayoutRequest {
    /// Checks the request and converts it into storable form. The destination
    /// block that does not match `method` is ignored.
    pub fn validate(&self) -> Result<ValidatedPayout, PayoutError> {
        let currency = if self.currency.is_empty() {
            SUPPORTED_CURRENCY.to_string()
        } else {
            self.currency.clone()
        };
        if currency != SUPPORTED_CURRENCY {
            return Err(PayoutError::validation(
                "INVALID_CURRENCY",
                format!("currency must be {SUPPORTED_CURRENCY}, got {currency:?}"),
            ));
        }

        let method = PayoutMethod::from_str(&self.method)
            .map_err(|msg| PayoutError::validation("INVALID_METHOD", msg))?;

        if self.amount <= Decimal::ZERO {
            return Err(PayoutError::validation("INVALID_AMOUNT", "amount must be > 0"));
        }
        let amount_minor = to_minor_units(self.amount)
            .filter(|minor| *minor > 0)
            .ok_or_else(|| {
                PayoutError::validation(
                    "INVALID_AMOUNT",
                    format!("amount {} is not representable in minor units", self.amount),
                )
            })?;

        let destination = match method {
            PayoutMethod::Upi => {
                let upi = self.upi.clone().unwrap_or_default();
                if upi.vpa.trim().is_empty() {
                    return Err(PayoutError::validation("INVALID_DESTINATION", "upi.vpa required"));
                }
                Destination::Upi {
                    vpa: upi.vpa,
                    name: non_empty(upi.name),
                }
            }
            PayoutMethod::Bank => {
                let bank = self.bank.clone().unwrap_or_default();
                if bank.account.trim().is_empty() || bank.ifsc.trim().is_empty() {
                    return Err(PayoutError::validation(
                        "INVALID_DESTINATION",
                        "bank.account & bank.ifsc required",
                    ));
                }
                Destination::Bank {
                    account: bank.account,
                    ifsc: bank.ifsc,
                    name: non_empty(bank.name),
                }
            }
        };

        Ok(ValidatedPayout {
            amount_minor,
            currency,
            destination,
            reference_id: non_empty(self.reference_id.clone()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Major units to minor units, truncating anything past two decimals.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount.checked_mul(Decimal::from(100))?.trunc().to_i64()
}

pub fn to_major_units(amount_minor: i64) -> Decimal {
    Decimal::new(amount_minor, 2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRecord {
    pub id: String,
    pub reference_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub destination: Destination,
    pub status: PayoutStatus,
    pub provider_ref: String,
    pub utr: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRecord {
    pub fn method(&self) -> PayoutMethod {
        self.destination.method()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePayoutResponse {
    pub payout_id: String,
    pub status: PayoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub expected_settlement: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutView {
    pub payout_id: String,
    pub status: PayoutStatus,
    pub method: PayoutMethod,
    /// `null` until the payout succeeds; always present in the body.
    pub utr: Option<String>,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&PayoutRecord> for PayoutView {
    fn from(record: &PayoutRecord) -> Self {
        Self {
            payout_id: record.id.clone(),
            status: record.status,
            method: record.method(),
            utr: record.utr.clone(),
            amount: to_major_units(record.amount_minor),
            error: record.error.clone(),
            processed_at: record.status.is_terminal().then_some(record.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub payout_id: String,
    pub status: PayoutStatus,
    pub method: PayoutMethod,
    pub utr: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&PayoutRecord> for LedgerEntry {
    fn from(record: &PayoutRecord) -> Self {
        Self {
            payout_id: record.id.clone(),
            status: record.status,
            method: record.method(),
            utr: record.utr.clone().unwrap_or_default(),
            amount: to_major_units(record.amount_minor),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn upi_request(amount: Decimal, currency: &str, vpa: &str) -> CreatePayoutRequest {
        CreatePayoutRequest {
            amount,
            currency: currency.to_string(),
            method: "upi".to_string(),
            upi: Some(UpiDestination {
                vpa: vpa.to_string(),
                name: Some("Asha".to_string()),
            }),
            bank: None,
            reference_id: Some("inv-42".to_string()),
        }
    }

    #[test]
    fn converts_two_decimal_amounts_exactly() {
        assert_eq!(to_minor_units(dec!(199.99)), Some(19999));
        assert_eq!(to_major_units(19999), dec!(199.99));
        assert_eq!(to_minor_units(dec!(1500.00)), Some(150000));
    }

    #[test]
    fn truncates_sub_minor_digits() {
        assert_eq!(to_minor_units(dec!(10.019)), Some(1001));
    }

    #[test]
    fn empty_currency_defaults_to_inr() {
        let validated = upi_request(dec!(10), "", "a@bank").validate().unwrap();
        assert_eq!(validated.currency, "INR");
        assert_eq!(validated.amount_minor, 1000);
        assert_eq!(validated.method(), PayoutMethod::Upi);
    }

    #[test]
    fn currency_match_is_case_sensitive() {
        let err = upi_request(dec!(10), "inr", "a@bank").validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_CURRENCY");
        assert!(err.to_string().contains("currency"));
    }

    #[test]
    fn rejects_non_positive_and_sub_paisa_amounts() {
        for amount in [dec!(0), dec!(-5), dec!(0.001)] {
            let err = upi_request(amount, "INR", "a@bank").validate().unwrap_err();
            assert_eq!(err.code(), "INVALID_AMOUNT");
        }
    }

    #[test]
    fn rejects_unknown_method() {
        let mut req = upi_request(dec!(10), "INR", "a@bank");
        req.method = "card".to_string();
        assert_eq!(req.validate().unwrap_err().code(), "INVALID_METHOD");
    }

    #[test]
    fn bank_requires_account_and_ifsc() {
        let req = CreatePayoutRequest {
            amount: dec!(10),
            currency: "INR".to_string(),
            method: "bank".to_string(),
            upi: None,
            bank: Some(BankDestination {
                account: "000123".to_string(),
                ifsc: " ".to_string(),
                name: None,
            }),
            reference_id: None,
        };
        assert_eq!(req.validate().unwrap_err().code(), "INVALID_DESTINATION");
    }

    #[test]
    fn keeps_only_the_destination_matching_method() {
        let mut req = upi_request(dec!(10), "INR", "a@bank");
        req.bank = Some(BankDestination {
            account: "1".to_string(),
            ifsc: "HDFC0001".to_string(),
            name: None,
        });
        let validated = req.validate().unwrap();
        let dest = validated.destination.to_provider_map();
        assert_eq!(dest.get("vpa").map(String::as_str), Some("a@bank"));
        assert!(!dest.contains_key("account"));
    }

    #[test]
    fn ids_carry_prefixes() {
        assert!(new_payout_id().starts_with("po_"));
        assert!(new_event_id().starts_with("evt_"));
    }
}
