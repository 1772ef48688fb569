use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "escrow_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Unfunded,
    Funded,
    Released,
    Disputed,
    Refunded,
}

impl EscrowStatus {
    /// Money has entered escrow and not been returned to the client.
    pub fn has_committed_funds(&self) -> bool {
        matches!(
            self,
            EscrowStatus::Funded | EscrowStatus::Released | EscrowStatus::Disputed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "currency_code", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Tnd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Tnd => "TND",
            Currency::Eur => "EUR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Konnect,
    Paymee,
    Paymaster,
    Zitouna,
    Gpg,
    Stripe,
    /// Internal platform movements such as escrow releases.
    System,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Konnect => "konnect",
            PaymentProvider::Paymee => "paymee",
            PaymentProvider::Paymaster => "paymaster",
            PaymentProvider::Zitouna => "zitouna",
            PaymentProvider::Gpg => "gpg",
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::System => "system",
        }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, PaymentProvider::System)
    }
}

impl FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "konnect" => Ok(Self::Konnect),
            "paymee" => Ok(Self::Paymee),
            "paymaster" => Ok(Self::Paymaster),
            "zitouna" => Ok(Self::Zitouna),
            "gpg" => Ok(Self::Gpg),
            "stripe" => Ok(Self::Stripe),
            "system" => Ok(Self::System),
            other => Err(format!("unsupported payment provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: Decimal,
    pub currency: Currency,
    pub status: JobStatus,
    pub escrow_status: EscrowStatus,
    pub payment_provider: PaymentProvider,
    pub deadline: Option<DateTime<Utc>>,
    pub required_skills: Vec<String>,
    pub location: Option<String>,
    pub location_required: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: Decimal,
    pub currency: Currency,
    pub payment_provider: PaymentProvider,
    pub deadline: Option<DateTime<Utc>>,
    pub required_skills: Vec<String>,
    pub location: Option<String>,
    pub location_required: bool,
}

/// Partial update applied to a job. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct JobChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub budget: Option<Decimal>,
    pub deadline: Option<DateTime<Utc>>,
    pub required_skills: Option<Vec<String>>,
    pub location: Option<String>,
    pub location_required: Option<bool>,
    pub status: Option<JobStatus>,
}

/// State a job must still be in for a conditional write to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobExpectation {
    pub status: JobStatus,
    pub escrow_status: EscrowStatus,
}

impl JobExpectation {
    pub fn of(job: &Job) -> Self {
        Self {
            status: job.status,
            escrow_status: job.escrow_status,
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        job.status == self.status && job.escrow_status == self.escrow_status
    }
}
