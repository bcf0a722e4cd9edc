use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error("provider error: {0}")]
    Provider(String),
    #[error("payout not found: {0}")]
    NotFound(String),
    #[error("timed out while {0}")]
    Timeout(&'static str),
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl PayoutError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        PayoutError::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PayoutError::Validation { code, .. } => code,
            PayoutError::Provider(_) => "PROVIDER_REJECTED",
            PayoutError::NotFound(_) => "NOT_FOUND",
            PayoutError::Timeout(_) => "TIMEOUT",
            PayoutError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the caller sent something wrong, as opposed to "try again".
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PayoutError::Validation { .. } | PayoutError::Provider(_) | PayoutError::NotFound(_)
        )
    }
}
