use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::job::PaymentProvider;
use crate::models::transaction::{TransactionKind, TransactionStatus};
use crate::services::fees::FeeBreakdown;

fn validate_external_provider(provider: &str) -> Result<(), ValidationError> {
    match provider.parse::<PaymentProvider>() {
        Ok(p) if p.is_external() => Ok(()),
        _ => {
            let mut err = ValidationError::new("unsupported_provider");
            err.message = Some("Unsupported payment provider".into());
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FundEscrowPayload {
    pub job_id: Uuid,
    #[validate(custom(function = "validate_external_provider"))]
    pub provider: String,
}

impl FundEscrowPayload {
    pub fn provider(&self) -> Option<PaymentProvider> {
        self.provider.parse().ok().filter(PaymentProvider::is_external)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmPaymentPayload {
    pub transaction_id: Uuid,
    /// `"success"` settles the deposit; anything else declines it.
    #[validate(length(min = 1, max = 50))]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReleaseEscrowPayload {
    pub job_id: Uuid,
    pub submission_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundEscrowResponse {
    pub transaction_id: Uuid,
    pub payment_url: String,
    pub breakdown: FeeBreakdown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentHistoryQuery {
    pub status: Option<TransactionStatus>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
}
