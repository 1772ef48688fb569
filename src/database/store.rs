use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    job::{Currency, Job, JobChanges, JobExpectation, JobStatus, NewJob},
    message::{Message, NewMessage},
    notification::{NewNotification, Notification},
    submission::{NewSubmission, Submission, SubmissionStatus},
    transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus},
    user::{NewUser, Role, User},
};

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub category: Option<String>,
    pub min_budget: Option<Decimal>,
    pub max_budget: Option<Decimal>,
    pub search: Option<String>,
    pub client_id: Option<Uuid>,
    pub page: i64,
    pub limit: i64,
}

impl JobFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub job_id: Option<Uuid>,
    pub freelancer_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to entries where this user is sender or receiver.
    pub party: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub kind: Option<TransactionKind>,
}

/// Result of a gateway callback on a pending deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Success { provider_reference: String },
    Failure,
}

#[derive(Debug, Clone)]
pub struct DepositSettlement {
    pub transaction_id: Uuid,
    pub outcome: SettlementOutcome,
}

#[derive(Debug, Clone)]
pub enum DepositOutcome {
    Missing,
    Funded { transaction: Transaction, job: Job },
    Declined(Transaction),
    /// The transaction had already left `pending`; nothing was written.
    AlreadySettled(Transaction),
    /// The job was no longer fundable when the deposit cleared; the
    /// transaction has been marked failed.
    JobConflict(Transaction),
}

#[derive(Debug, Clone)]
pub struct LegacyAcceptance {
    pub submission_id: Uuid,
    pub expected_status: SubmissionStatus,
    pub job_id: Uuid,
    pub expected_job: JobExpectation,
    pub freelancer_id: Uuid,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EscrowRelease {
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub expected_job_status: JobStatus,
    pub submission_id: Uuid,
    pub expected_submission_status: SubmissionStatus,
    pub freelancer_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRecord {
    pub transaction: Transaction,
    pub job: Job,
    pub submission: Submission,
}

#[derive(Debug, Clone)]
pub struct SubmissionRating {
    pub submission_id: Uuid,
    pub rating: i16,
    pub review: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RatedSubmission {
    pub submission: Submission,
    /// Mean of every rating the freelancer has received, this one included.
    pub freelancer_rating: Decimal,
}

/// Persistence contract for the marketplace.
///
/// Every `*_if` method and the multi-entity operations (`settle_deposit`,
/// `release_escrow`, `accept_submission`) are conditional writes: they apply
/// only when the rows still hold the expected prior state, and either all of
/// their effects become visible or none do. A lost race is reported through
/// the return value, never retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>>;
    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>>;

    /// Inserts the job and bumps the owner's `total_jobs_posted`.
    async fn insert_job(&self, job: NewJob) -> Result<Job>;
    async fn find_job(&self, id: Uuid) -> Result<Option<Job>>;
    async fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, i64)>;
    async fn count_submissions(&self, job_id: Uuid) -> Result<i64>;
    /// True when the job has ledger entries, submissions or messages.
    async fn job_has_history(&self, job_id: Uuid) -> Result<bool>;
    async fn update_job_if(
        &self,
        id: Uuid,
        expected: JobExpectation,
        changes: JobChanges,
    ) -> Result<Option<Job>>;
    async fn delete_job_if(&self, id: Uuid, expected: JobExpectation) -> Result<bool>;

    /// Fails with `InvalidState` when the freelancer already submitted.
    async fn insert_submission(&self, submission: NewSubmission) -> Result<Submission>;
    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>>;
    async fn submission_exists(&self, job_id: Uuid, freelancer_id: Uuid) -> Result<bool>;
    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>>;
    async fn update_submission_status_if(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        feedback: Option<String>,
    ) -> Result<Option<Submission>>;
    /// Direct acceptance: submission to `accepted`, job `open -> in_progress`,
    /// freelancer `total_jobs_completed + 1`.
    async fn accept_submission(
        &self,
        acceptance: LegacyAcceptance,
    ) -> Result<Option<(Submission, Job)>>;
    /// Rates an accepted, unrated submission and recomputes the freelancer's
    /// mean rating in the same atomic step.
    async fn rate_submission(&self, rating: SubmissionRating) -> Result<Option<RatedSubmission>>;
    async fn delete_submission_if(&self, id: Uuid, expected: SubmissionStatus) -> Result<bool>;

    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction>;
    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>>;
    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;
    async fn settle_deposit(&self, settlement: DepositSettlement) -> Result<DepositOutcome>;
    /// `None` when the job or submission no longer holds the expected state.
    async fn release_escrow(&self, release: EscrowRelease) -> Result<Option<ReleaseRecord>>;

    async fn insert_message(&self, message: NewMessage) -> Result<Message>;
    /// Messages of a job, optionally restricted to those `party` sent or received.
    async fn list_job_messages(&self, job_id: Uuid, party: Option<Uuid>) -> Result<Vec<Message>>;
    async fn list_user_messages(&self, user_id: Uuid) -> Result<Vec<Message>>;
    async fn mark_messages_read(&self, job_id: Uuid, receiver_id: Uuid) -> Result<u64>;
    async fn count_unread_messages(&self, receiver_id: Uuid) -> Result<i64>;

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;
    async fn list_notifications(&self, user_id: Uuid, unread_only: bool)
        -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid)
        -> Result<Option<Notification>>;
}
