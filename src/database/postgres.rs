use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store::{
    DepositOutcome, DepositSettlement, EscrowRelease, JobFilter, LegacyAcceptance,
    MarketplaceStore, RatedSubmission, ReleaseRecord, SettlementOutcome, SubmissionFilter,
    SubmissionRating, TransactionFilter,
};
use crate::error::{Error, Result};
use crate::models::{
    job::{Job, JobChanges, JobExpectation, NewJob, PaymentProvider},
    message::{Message, NewMessage},
    notification::{NewNotification, Notification},
    submission::{NewSubmission, Submission, SubmissionStatus},
    transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus},
    user::{NewUser, Role, User},
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl MarketplaceStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, phone, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(&user.phone)
        .bind(&user.location)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(Error::InvalidState(
                "An account with this email already exists".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                id, client_id, title, description, category, budget, currency,
                payment_provider, deadline, required_skills, location, location_required
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job.client_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.category)
        .bind(job.budget)
        .bind(job.currency)
        .bind(job.payment_provider)
        .bind(job.deadline)
        .bind(&job.required_skills)
        .bind(&job.location)
        .bind(job.location_required)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users SET total_jobs_posted = total_jobs_posted + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(job.client_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, i64)> {
        const WHERE: &str = r#"
            WHERE ($1::job_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::numeric IS NULL OR budget >= $3)
              AND ($4::numeric IS NULL OR budget <= $4)
              AND ($5::text IS NULL OR title ILIKE '%' || $5 || '%' OR description ILIKE '%' || $5 || '%')
              AND ($6::uuid IS NULL OR client_id = $6)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM jobs {}", WHERE))
            .bind(filter.status)
            .bind(&filter.category)
            .bind(filter.min_budget)
            .bind(filter.max_budget)
            .bind(&filter.search)
            .bind(filter.client_id)
            .fetch_one(&self.pool)
            .await?;

        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT $7 OFFSET $8",
            WHERE
        ))
        .bind(filter.status)
        .bind(&filter.category)
        .bind(filter.min_budget)
        .bind(filter.max_budget)
        .bind(&filter.search)
        .bind(filter.client_id)
        .bind(filter.limit)
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((jobs, total))
    }

    async fn count_submissions(&self, job_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn job_has_history(&self, job_id: Uuid) -> Result<bool> {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM transactions WHERE job_id = $1)
                OR EXISTS (SELECT 1 FROM submissions WHERE job_id = $1)
                OR EXISTS (SELECT 1 FROM messages WHERE job_id = $1)
            "#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(referenced)
    }

    async fn update_job_if(
        &self,
        id: Uuid,
        expected: JobExpectation,
        changes: JobChanges,
    ) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET
                title = COALESCE($4, title),
                description = COALESCE($5, description),
                category = COALESCE($6, category),
                budget = COALESCE($7, budget),
                deadline = COALESCE($8, deadline),
                required_skills = COALESCE($9, required_skills),
                location = COALESCE($10, location),
                location_required = COALESCE($11, location_required),
                status = COALESCE($12, status),
                updated_at = NOW()
            WHERE id = $1 AND status = $2 AND escrow_status = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected.status)
        .bind(expected.escrow_status)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.category)
        .bind(changes.budget)
        .bind(changes.deadline)
        .bind(changes.required_skills)
        .bind(changes.location)
        .bind(changes.location_required)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn delete_job_if(&self, id: Uuid, expected: JobExpectation) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE id = $1 AND status = $2 AND escrow_status = $3",
        )
        .bind(id)
        .bind(expected.status)
        .bind(expected.escrow_status)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            // A child row appeared between the history check and the delete.
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_submission(&self, submission: NewSubmission) -> Result<Submission> {
        let result = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (id, job_id, freelancer_id, description, attachments)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(submission.job_id)
        .bind(submission.freelancer_id)
        .bind(&submission.description)
        .bind(&submission.attachments)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(err) if is_unique_violation(&err) => Err(Error::InvalidState(
                "You have already submitted work for this job".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        let submission = sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(submission)
    }

    async fn submission_exists(&self, job_id: Uuid, freelancer_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM submissions WHERE job_id = $1 AND freelancer_id = $2)",
        )
        .bind(job_id)
        .bind(freelancer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
        let submissions = sqlx::query_as::<_, Submission>(
            r#"
            SELECT * FROM submissions
            WHERE ($1::uuid IS NULL OR job_id = $1)
              AND ($2::uuid IS NULL OR freelancer_id = $2)
              AND ($3::submission_status IS NULL OR status = $3)
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(filter.job_id)
        .bind(filter.freelancer_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(submissions)
    }

    async fn update_submission_status_if(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        feedback: Option<String>,
    ) -> Result<Option<Submission>> {
        let submission = sqlx::query_as::<_, Submission>(
            r#"
            UPDATE submissions
            SET status = $3, client_feedback = COALESCE($4, client_feedback), updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(feedback)
        .fetch_optional(&self.pool)
        .await?;
        Ok(submission)
    }

    async fn accept_submission(
        &self,
        acceptance: LegacyAcceptance,
    ) -> Result<Option<(Submission, Job)>> {
        let mut tx = self.pool.begin().await?;

        let submission = sqlx::query_as::<_, Submission>(
            r#"
            UPDATE submissions
            SET status = 'accepted', client_feedback = COALESCE($4, client_feedback), updated_at = NOW()
            WHERE id = $1 AND job_id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(acceptance.submission_id)
        .bind(acceptance.job_id)
        .bind(acceptance.expected_status)
        .bind(&acceptance.feedback)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(submission) = submission else {
            tx.rollback().await?;
            return Ok(None);
        };

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'in_progress', updated_at = NOW()
            WHERE id = $1 AND status = $2 AND escrow_status = $3
            RETURNING *
            "#,
        )
        .bind(acceptance.job_id)
        .bind(acceptance.expected_job.status)
        .bind(acceptance.expected_job.escrow_status)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(job) = job else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE users SET total_jobs_completed = total_jobs_completed + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(acceptance.freelancer_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((submission, job)))
    }

    async fn rate_submission(&self, rating: SubmissionRating) -> Result<Option<RatedSubmission>> {
        let mut tx = self.pool.begin().await?;

        let freelancer_id: Option<Uuid> =
            sqlx::query_scalar("SELECT freelancer_id FROM submissions WHERE id = $1")
                .bind(rating.submission_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(freelancer_id) = freelancer_id else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Serializes raters of the same freelancer so the average below sees every commit.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(freelancer_id)
            .execute(&mut *tx)
            .await?;

        let submission = sqlx::query_as::<_, Submission>(
            r#"
            UPDATE submissions
            SET rating = $2, review = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'accepted' AND rating IS NULL
            RETURNING *
            "#,
        )
        .bind(rating.submission_id)
        .bind(rating.rating)
        .bind(rating.review)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(submission) = submission else {
            tx.rollback().await?;
            return Ok(None);
        };

        let freelancer_rating: Decimal = sqlx::query_scalar(
            r#"
            UPDATE users
            SET rating = COALESCE((
                    SELECT ROUND(AVG(rating)::numeric, 2)
                    FROM submissions
                    WHERE freelancer_id = $1 AND rating IS NOT NULL
                ), 0),
                updated_at = NOW()
            WHERE id = $1
            RETURNING rating
            "#,
        )
        .bind(freelancer_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(RatedSubmission {
            submission,
            freelancer_rating,
        }))
    }

    async fn delete_submission_if(&self, id: Uuid, expected: SubmissionStatus) -> Result<bool> {
        let done = sqlx::query("DELETE FROM submissions WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn insert_transaction(&self, new: NewTransaction) -> Result<Transaction> {
        let created = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id, job_id, sender_id, receiver_id, amount, currency, type, status,
                provider, platform_fee, processor_fee, metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.job_id)
        .bind(new.sender_id)
        .bind(new.receiver_id)
        .bind(new.amount)
        .bind(new.currency)
        .bind(new.kind)
        .bind(new.status)
        .bind(new.provider)
        .bind(new.fees.platform_fee)
        .bind(new.fees.processor_fee)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tx)
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let txs = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE ($1::uuid IS NULL OR sender_id = $1 OR receiver_id = $1)
              AND ($2::transaction_status IS NULL OR status = $2)
              AND ($3::transaction_type IS NULL OR type = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.party)
        .bind(filter.status)
        .bind(filter.kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(txs)
    }

    async fn settle_deposit(&self, settlement: DepositSettlement) -> Result<DepositOutcome> {
        let (next, reference) = match &settlement.outcome {
            SettlementOutcome::Success { provider_reference } => {
                (TransactionStatus::Completed, Some(provider_reference.clone()))
            }
            SettlementOutcome::Failure => (TransactionStatus::Failed, None),
        };

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = $2, provider_transaction_id = COALESCE($3, provider_transaction_id), updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND type = $4
            RETURNING *
            "#,
        )
        .bind(settlement.transaction_id)
        .bind(next)
        .bind(reference)
        .bind(TransactionKind::EscrowDeposit)
        .fetch_optional(&mut *tx)
        .await;

        let updated = match updated {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                // Another deposit for the same job completed first.
                tx.rollback().await?;
                return self.fail_conflicting_deposit(settlement.transaction_id).await;
            }
            Err(err) => return Err(err.into()),
        };

        let Some(transaction) = updated else {
            tx.rollback().await?;
            return match self.find_transaction(settlement.transaction_id).await? {
                Some(existing) => Ok(DepositOutcome::AlreadySettled(existing)),
                None => Ok(DepositOutcome::Missing),
            };
        };

        if next == TransactionStatus::Failed {
            tx.commit().await?;
            return Ok(DepositOutcome::Declined(transaction));
        }

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET escrow_status = 'funded', status = 'open', payment_provider = $2, updated_at = NOW()
            WHERE id = $1 AND escrow_status = 'unfunded' AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(transaction.job_id)
        .bind(transaction.provider)
        .fetch_optional(&mut *tx)
        .await?;

        match job {
            Some(job) => {
                tx.commit().await?;
                Ok(DepositOutcome::Funded { transaction, job })
            }
            None => {
                tx.rollback().await?;
                self.fail_conflicting_deposit(settlement.transaction_id).await
            }
        }
    }

    async fn release_escrow(&self, release: EscrowRelease) -> Result<Option<ReleaseRecord>> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET escrow_status = 'released', status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND client_id = $2 AND escrow_status = 'funded' AND status = $3
            RETURNING *
            "#,
        )
        .bind(release.job_id)
        .bind(release.client_id)
        .bind(release.expected_job_status)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(job) = job else {
            tx.rollback().await?;
            return Ok(None);
        };

        let submission = sqlx::query_as::<_, Submission>(
            r#"
            UPDATE submissions
            SET status = 'accepted', updated_at = NOW()
            WHERE id = $1 AND job_id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(release.submission_id)
        .bind(release.job_id)
        .bind(release.expected_submission_status)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(submission) = submission else {
            tx.rollback().await?;
            return Ok(None);
        };

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id, job_id, sender_id, receiver_id, amount, currency, type, status,
                provider, provider_transaction_id, platform_fee, processor_fee, metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, 'escrow_release', 'completed', $7, NULL, 0, 0, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(release.job_id)
        .bind(release.client_id)
        .bind(release.freelancer_id)
        .bind(release.amount)
        .bind(release.currency)
        .bind(PaymentProvider::System)
        .bind(serde_json::json!({ "submission_id": release.submission_id }))
        .fetch_one(&mut *tx)
        .await?;

        let newly_completed: i32 =
            if release.expected_submission_status == SubmissionStatus::Accepted {
                0
            } else {
                1
            };
        sqlx::query(
            r#"
            UPDATE users
            SET total_earned = total_earned + $2,
                total_jobs_completed = total_jobs_completed + $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(release.freelancer_id)
        .bind(release.amount)
        .bind(newly_completed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ReleaseRecord {
            transaction,
            job,
            submission,
        }))
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        let created = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, job_id, sender_id, receiver_id, message_text, attachments)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.job_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.message_text)
        .bind(&message.attachments)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_job_messages(&self, job_id: Uuid, party: Option<Uuid>) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE job_id = $1 AND ($2::uuid IS NULL OR sender_id = $2 OR receiver_id = $2)
            ORDER BY sent_at ASC
            "#,
        )
        .bind(job_id)
        .bind(party)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn list_user_messages(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY sent_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn mark_messages_read(&self, job_id: Uuid, receiver_id: Uuid) -> Result<u64> {
        let done = sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE, read_at = NOW()
            WHERE job_id = $1 AND receiver_id = $2 AND NOT is_read
            "#,
        )
        .bind(job_id)
        .bind(receiver_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn count_unread_messages(&self, receiver_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND NOT is_read",
        )
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let created = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.link)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT 100
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }
}

impl PgStore {
    async fn fail_conflicting_deposit(&self, transaction_id: Uuid) -> Result<DepositOutcome> {
        let failed = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'failed',
                metadata = metadata || '{"failure": "job_not_fundable"}'::jsonb,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        match failed {
            Some(tx) => Ok(DepositOutcome::JobConflict(tx)),
            None => match self.find_transaction(transaction_id).await? {
                Some(existing) => Ok(DepositOutcome::AlreadySettled(existing)),
                None => Ok(DepositOutcome::Missing),
            },
        }
    }
}
