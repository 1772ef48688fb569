use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::database::store::{
    DepositOutcome, DepositSettlement, EscrowRelease, JobFilter, LegacyAcceptance,
    MarketplaceStore, RatedSubmission, ReleaseRecord, SettlementOutcome, SubmissionFilter,
    SubmissionRating, TransactionFilter,
};
use crate::error::{Error, Result};
use crate::models::{
    job::{EscrowStatus, Job, JobChanges, JobExpectation, JobStatus, NewJob, PaymentProvider},
    message::{Message, NewMessage},
    notification::{NewNotification, Notification},
    submission::{NewSubmission, Submission, SubmissionStatus},
    transaction::{
        NewTransaction, Transaction, TransactionFees, TransactionKind, TransactionStatus,
    },
    user::{NewUser, Role, User},
};
use crate::services::lifecycle::mean_rating;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    jobs: HashMap<Uuid, Job>,
    submissions: HashMap<Uuid, Submission>,
    transactions: HashMap<Uuid, Transaction>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn has_completed(&self, job_id: Uuid, kind: TransactionKind) -> bool {
        self.transactions.values().any(|tx| {
            tx.job_id == job_id && tx.kind == kind && tx.status == TransactionStatus::Completed
        })
    }
}

/// Process-local store. Every operation runs under a single lock, so each
/// conditional write is trivially atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn matches_search(job: &Job, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    job.title.to_lowercase().contains(&needle) || job.description.to_lowercase().contains(&needle)
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.lock();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(Error::InvalidState(
                "An account with this email already exists".to_string(),
            ));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            phone: user.phone,
            location: user.location,
            bio: None,
            rating: Decimal::ZERO,
            total_jobs_completed: 0,
            total_jobs_posted: 0,
            total_earned: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .lock()
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>> {
        let mut tables = self.lock();
        Ok(tables.users.get_mut(&id).map(|user| {
            user.is_active = active;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }


    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        let mut tables = self.lock();
        let Some(owner) = tables.users.get_mut(&job.client_id) else {
            return Err(Error::NotFound("Client not found".to_string()));
        };
        owner.total_jobs_posted += 1;

        let now = Utc::now();
        let created = Job {
            id: Uuid::new_v4(),
            client_id: job.client_id,
            title: job.title,
            description: job.description,
            category: job.category,
            budget: job.budget,
            currency: job.currency,
            status: JobStatus::Open,
            escrow_status: EscrowStatus::Unfunded,
            payment_provider: job.payment_provider,
            deadline: job.deadline,
            required_skills: job.required_skills,
            location: job.location,
            location_required: job.location_required,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.jobs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, i64)> {
        let tables = self.lock();
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| filter.status.map_or(true, |s| job.status == s))
            .filter(|job| filter.category.as_ref().map_or(true, |c| &job.category == c))
            .filter(|job| filter.min_budget.map_or(true, |min| job.budget >= min))
            .filter(|job| filter.max_budget.map_or(true, |max| job.budget <= max))
            .filter(|job| filter.search.as_deref().map_or(true, |s| matches_search(job, s)))
            .filter(|job| filter.client_id.map_or(true, |c| job.client_id == c))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = jobs.len() as i64;
        let page = jobs
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn count_submissions(&self, job_id: Uuid) -> Result<i64> {
        let tables = self.lock();
        Ok(tables.submissions.values().filter(|s| s.job_id == job_id).count() as i64)
    }

    async fn job_has_history(&self, job_id: Uuid) -> Result<bool> {
        let tables = self.lock();
        Ok(tables.transactions.values().any(|t| t.job_id == job_id)
            || tables.submissions.values().any(|s| s.job_id == job_id)
            || tables.messages.iter().any(|m| m.job_id == job_id))
    }

    async fn update_job_if(
        &self,
        id: Uuid,
        expected: JobExpectation,
        changes: JobChanges,
    ) -> Result<Option<Job>> {
        let mut tables = self.lock();
        let Some(job) = tables.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if !expected.matches(job) {
            return Ok(None);
        }
        if let Some(title) = changes.title {
            job.title = title;
        }
        if let Some(description) = changes.description {
            job.description = description;
        }
        if let Some(category) = changes.category {
            job.category = category;
        }
        if let Some(budget) = changes.budget {
            job.budget = budget;
        }
        if changes.deadline.is_some() {
            job.deadline = changes.deadline;
        }
        if let Some(skills) = changes.required_skills {
            job.required_skills = skills;
        }
        if changes.location.is_some() {
            job.location = changes.location;
        }
        if let Some(required) = changes.location_required {
            job.location_required = required;
        }
        if let Some(status) = changes.status {
            job.status = status;
        }
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn delete_job_if(&self, id: Uuid, expected: JobExpectation) -> Result<bool> {
        let mut tables = self.lock();
        let deletable = tables.jobs.get(&id).is_some_and(|job| expected.matches(job))
            && !tables.transactions.values().any(|t| t.job_id == id)
            && !tables.submissions.values().any(|s| s.job_id == id)
            && !tables.messages.iter().any(|m| m.job_id == id);
        if deletable {
            tables.jobs.remove(&id);
        }
        Ok(deletable)
    }

    async fn insert_submission(&self, submission: NewSubmission) -> Result<Submission> {
        let mut tables = self.lock();
        let duplicate = tables.submissions.values().any(|s| {
            s.job_id == submission.job_id && s.freelancer_id == submission.freelancer_id
        });
        if duplicate {
            return Err(Error::InvalidState(
                "You have already submitted work for this job".to_string(),
            ));
        }
        let now = Utc::now();
        let created = Submission {
            id: Uuid::new_v4(),
            job_id: submission.job_id,
            freelancer_id: submission.freelancer_id,
            description: submission.description,
            attachments: submission.attachments,
            status: SubmissionStatus::Pending,
            client_feedback: None,
            rating: None,
            review: None,
            submitted_at: now,
            created_at: now,
            updated_at: now,
        };
        tables.submissions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        Ok(self.lock().submissions.get(&id).cloned())
    }

    async fn submission_exists(&self, job_id: Uuid, freelancer_id: Uuid) -> Result<bool> {
        Ok(self
            .lock()
            .submissions
            .values()
            .any(|s| s.job_id == job_id && s.freelancer_id == freelancer_id))
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .lock()
            .submissions
            .values()
            .filter(|s| filter.job_id.map_or(true, |id| s.job_id == id))
            .filter(|s| filter.freelancer_id.map_or(true, |id| s.freelancer_id == id))
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }

    async fn update_submission_status_if(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        feedback: Option<String>,
    ) -> Result<Option<Submission>> {
        let mut tables = self.lock();
        let Some(submission) = tables.submissions.get_mut(&id) else {
            return Ok(None);
        };
        if submission.status != expected {
            return Ok(None);
        }
        submission.status = next;
        if feedback.is_some() {
            submission.client_feedback = feedback;
        }
        submission.updated_at = Utc::now();
        Ok(Some(submission.clone()))
    }

    async fn accept_submission(
        &self,
        acceptance: LegacyAcceptance,
    ) -> Result<Option<(Submission, Job)>> {
        let mut tables = self.lock();
        let submission_ready = tables.submissions.get(&acceptance.submission_id).is_some_and(|s| {
            s.job_id == acceptance.job_id && s.status == acceptance.expected_status
        });
        let job_ready = tables
            .jobs
            .get(&acceptance.job_id)
            .is_some_and(|job| acceptance.expected_job.matches(job));
        if !submission_ready || !job_ready {
            return Ok(None);
        }

        let now = Utc::now();
        let (Some(submission), Some(job)) = (
            tables.submissions.get_mut(&acceptance.submission_id).map(|s| {
                s.status = SubmissionStatus::Accepted;
                if acceptance.feedback.is_some() {
                    s.client_feedback = acceptance.feedback.clone();
                }
                s.updated_at = now;
                s.clone()
            }),
            tables.jobs.get_mut(&acceptance.job_id).map(|job| {
                job.status = JobStatus::InProgress;
                job.updated_at = now;
                job.clone()
            }),
        ) else {
            return Ok(None);
        };
        if let Some(freelancer) = tables.users.get_mut(&acceptance.freelancer_id) {
            freelancer.total_jobs_completed += 1;
            freelancer.updated_at = now;
        }
        Ok(Some((submission, job)))
    }

    async fn rate_submission(&self, rating: SubmissionRating) -> Result<Option<RatedSubmission>> {
        let mut tables = self.lock();
        let now = Utc::now();
        let Some(submission) = tables.submissions.get_mut(&rating.submission_id) else {
            return Ok(None);
        };
        if submission.status != SubmissionStatus::Accepted || submission.rating.is_some() {
            return Ok(None);
        }
        submission.rating = Some(rating.rating);
        submission.review = rating.review;
        submission.updated_at = now;
        let submission = submission.clone();

        let ratings: Vec<i16> = tables
            .submissions
            .values()
            .filter(|s| s.freelancer_id == submission.freelancer_id)
            .filter_map(|s| s.rating)
            .collect();
        let freelancer_rating = mean_rating(&ratings).unwrap_or_default();
        if let Some(freelancer) = tables.users.get_mut(&submission.freelancer_id) {
            freelancer.rating = freelancer_rating;
            freelancer.updated_at = now;
        }
        Ok(Some(RatedSubmission {
            submission,
            freelancer_rating,
        }))
    }

    async fn delete_submission_if(&self, id: Uuid, expected: SubmissionStatus) -> Result<bool> {
        let mut tables = self.lock();
        let matches = tables.submissions.get(&id).is_some_and(|s| s.status == expected);
        if matches {
            tables.submissions.remove(&id);
        }
        Ok(matches)
    }

    async fn insert_transaction(&self, new: NewTransaction) -> Result<Transaction> {
        let mut tables = self.lock();
        let now = Utc::now();
        let created = Transaction {
            id: Uuid::new_v4(),
            job_id: new.job_id,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            amount: new.amount,
            currency: new.currency,
            kind: new.kind,
            status: new.status,
            provider: new.provider,
            provider_transaction_id: None,
            fees: new.fees,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };
        tables.transactions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        Ok(self.lock().transactions.get(&id).cloned())
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut txs: Vec<Transaction> = self
            .lock()
            .transactions
            .values()
            .filter(|t| {
                filter
                    .party
                    .map_or(true, |p| t.sender_id == p || t.receiver_id == Some(p))
            })
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.kind.map_or(true, |k| t.kind == k))
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(txs)
    }

    async fn settle_deposit(&self, settlement: DepositSettlement) -> Result<DepositOutcome> {
        let mut tables = self.lock();
        let Some(current) = tables.transactions.get(&settlement.transaction_id).cloned() else {
            return Ok(DepositOutcome::Missing);
        };
        if current.kind != TransactionKind::EscrowDeposit
            || current.status != TransactionStatus::Pending
        {
            return Ok(DepositOutcome::AlreadySettled(current));
        }

        let now = Utc::now();
        let provider_reference = match settlement.outcome {
            SettlementOutcome::Failure => {
                let Some(tx) = tables.transactions.get_mut(&current.id) else {
                    return Ok(DepositOutcome::Missing);
                };
                tx.status = TransactionStatus::Failed;
                tx.updated_at = now;
                return Ok(DepositOutcome::Declined(tx.clone()));
            }
            SettlementOutcome::Success { provider_reference } => provider_reference,
        };

        let fundable = !tables.has_completed(current.job_id, TransactionKind::EscrowDeposit)
            && tables.jobs.get(&current.job_id).is_some_and(|job| {
                job.status == JobStatus::Open && job.escrow_status == EscrowStatus::Unfunded
            });

        let Some(tx) = tables.transactions.get_mut(&current.id) else {
            return Ok(DepositOutcome::Missing);
        };
        tx.updated_at = now;
        if !fundable {
            tx.status = TransactionStatus::Failed;
            if let Some(meta) = tx.metadata.as_object_mut() {
                meta.insert("failure".to_string(), "job_not_fundable".into());
            }
            return Ok(DepositOutcome::JobConflict(tx.clone()));
        }
        tx.status = TransactionStatus::Completed;
        tx.provider_transaction_id = Some(provider_reference);
        let transaction = tx.clone();

        let Some(job) = tables.jobs.get_mut(&transaction.job_id) else {
            return Ok(DepositOutcome::Missing);
        };
        job.escrow_status = EscrowStatus::Funded;
        job.status = JobStatus::Open;
        job.payment_provider = transaction.provider;
        job.updated_at = now;
        let job = job.clone();

        Ok(DepositOutcome::Funded { transaction, job })
    }

    async fn release_escrow(&self, release: EscrowRelease) -> Result<Option<ReleaseRecord>> {
        let mut tables = self.lock();
        let job_ready = tables.jobs.get(&release.job_id).is_some_and(|job| {
            job.client_id == release.client_id
                && job.escrow_status == EscrowStatus::Funded
                && job.status == release.expected_job_status
        });
        let submission_ready = tables.submissions.get(&release.submission_id).is_some_and(|s| {
            s.job_id == release.job_id && s.status == release.expected_submission_status
        });
        if !job_ready
            || !submission_ready
            || tables.has_completed(release.job_id, TransactionKind::EscrowRelease)
        {
            return Ok(None);
        }

        let now = Utc::now();
        let Some(job) = tables.jobs.get_mut(&release.job_id) else {
            return Ok(None);
        };
        job.escrow_status = EscrowStatus::Released;
        job.status = JobStatus::Completed;
        job.completed_at = Some(now);
        job.updated_at = now;
        let job = job.clone();

        let Some(submission) = tables.submissions.get_mut(&release.submission_id) else {
            return Ok(None);
        };
        submission.status = SubmissionStatus::Accepted;
        submission.updated_at = now;
        let submission = submission.clone();

        let transaction = Transaction {
            id: Uuid::new_v4(),
            job_id: release.job_id,
            sender_id: release.client_id,
            receiver_id: Some(release.freelancer_id),
            amount: release.amount,
            currency: release.currency,
            kind: TransactionKind::EscrowRelease,
            status: TransactionStatus::Completed,
            provider: PaymentProvider::System,
            provider_transaction_id: None,
            fees: TransactionFees::zero(),
            metadata: serde_json::json!({ "submission_id": release.submission_id }),
            created_at: now,
            updated_at: now,
        };
        tables.transactions.insert(transaction.id, transaction.clone());

        if let Some(freelancer) = tables.users.get_mut(&release.freelancer_id) {
            freelancer.total_earned += release.amount;
            if release.expected_submission_status != SubmissionStatus::Accepted {
                freelancer.total_jobs_completed += 1;
            }
            freelancer.updated_at = now;
        }

        Ok(Some(ReleaseRecord {
            transaction,
            job,
            submission,
        }))
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        let created = Message {
            id: Uuid::new_v4(),
            job_id: message.job_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message_text: message.message_text,
            attachments: message.attachments,
            is_read: false,
            sent_at: Utc::now(),
            read_at: None,
        };
        self.lock().messages.push(created.clone());
        Ok(created)
    }

    async fn list_job_messages(&self, job_id: Uuid, party: Option<Uuid>) -> Result<Vec<Message>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| m.job_id == job_id)
            .filter(|m| party.map_or(true, |p| m.sender_id == p || m.receiver_id == p))
            .cloned()
            .collect())
    }

    async fn list_user_messages(&self, user_id: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .rev()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_messages_read(&self, job_id: Uuid, receiver_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        let mut marked = 0;
        for message in self.lock().messages.iter_mut() {
            if message.job_id == job_id && message.receiver_id == receiver_id && !message.is_read {
                message.is_read = true;
                message.read_at = Some(now);
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn count_unread_messages(&self, receiver_id: Uuid) -> Result<i64> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| m.receiver_id == receiver_id && !m.is_read)
            .count() as i64)
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let created = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            link: notification.link,
            is_read: false,
            created_at: Utc::now(),
        };
        self.lock().notifications.push(created.clone());
        Ok(created)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .take(100)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>> {
        let mut tables = self.lock();
        Ok(tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.is_read = true;
                n.clone()
            }))
    }
}
