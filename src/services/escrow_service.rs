use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::database::store::{
    DepositOutcome, DepositSettlement, EscrowRelease, MarketplaceStore, ReleaseRecord,
    SettlementOutcome, TransactionFilter,
};
use crate::dto::payment_dto::{FundEscrowResponse, PaymentHistoryQuery};
use crate::error::{Error, Result};
use crate::models::{
    job::{EscrowStatus, Job, PaymentProvider},
    notification::NotificationKind,
    transaction::{NewTransaction, Transaction, TransactionFees, TransactionKind, TransactionStatus},
};
use crate::services::authorization::{self, located, Actor};
use crate::services::fees::{processor_fee_rate, FeeBreakdown};
use crate::services::lifecycle::{self, JobTrigger};
use crate::services::notification_service::{NotificationService, NotificationSignal};
use crate::utils::token::generate_reference;

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmResult {
    pub transaction: Transaction,
    pub job: Option<Job>,
    /// The callback repeated an outcome that was already recorded.
    pub replayed: bool,
}

#[derive(Clone)]
pub struct EscrowService {
    store: Arc<dyn MarketplaceStore>,
    notifications: NotificationService,
    frontend_url: String,
}

impl EscrowService {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        notifications: NotificationService,
        frontend_url: String,
    ) -> Self {
        Self {
            store,
            notifications,
            frontend_url,
        }
    }

    pub async fn fund_escrow(
        &self,
        actor: &Actor,
        job_id: Uuid,
        provider: PaymentProvider,
    ) -> Result<FundEscrowResponse> {
        let job = located(self.store.find_job(job_id).await?, "Job not found")?;
        authorization::can_fund_escrow(actor, &job)?;
        lifecycle::check_fundable(&job)?;
        if !provider.is_external() {
            return Err(Error::BadRequest("Unsupported payment provider".to_string()));
        }

        let breakdown = FeeBreakdown::compute(job.budget, provider);
        let tx = self
            .store
            .insert_transaction(NewTransaction {
                job_id: job.id,
                sender_id: actor.id,
                receiver_id: None,
                amount: breakdown.total,
                currency: job.currency,
                kind: TransactionKind::EscrowDeposit,
                status: TransactionStatus::Pending,
                provider,
                fees: TransactionFees {
                    platform_fee: breakdown.platform_fee,
                    processor_fee: breakdown.processor_fee,
                },
                metadata: json!({
                    "original_budget": job.budget,
                    "processor_fee_rate": processor_fee_rate(provider.as_str()),
                }),
            })
            .await?;

        tracing::info!(
            job_id = %job.id,
            transaction_id = %tx.id,
            provider = provider.as_str(),
            total = %breakdown.total,
            "escrow deposit initiated"
        );

        Ok(FundEscrowResponse {
            transaction_id: tx.id,
            payment_url: self.payment_url(&tx)?,
            breakdown,
        })
    }

    fn payment_url(&self, tx: &Transaction) -> Result<String> {
        let base = format!(
            "{}/mock-payment/{}",
            self.frontend_url.trim_end_matches('/'),
            tx.id
        );
        let mut url = Url::parse(&base)
            .map_err(|e| Error::Config(format!("Invalid FRONTEND_URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("provider", tx.provider.as_str())
            .append_pair("amount", &tx.amount.to_string())
            .append_pair("currency", tx.currency.as_str());
        Ok(url.into())
    }

    /// Applies a gateway outcome to a pending deposit. Repeating the outcome
    /// already recorded is a no-op; contradicting it is an error.
    pub async fn confirm_payment(&self, transaction_id: Uuid, status: &str) -> Result<ConfirmResult> {
        let tx = located(
            self.store.find_transaction(transaction_id).await?,
            "Transaction not found",
        )?;
        if tx.kind != TransactionKind::EscrowDeposit {
            return Err(Error::InvalidState(
                "Only escrow deposits can be confirmed".to_string(),
            ));
        }

        let success = status.eq_ignore_ascii_case("success");
        if tx.status.is_terminal() {
            return self.replay(tx, success).await;
        }

        let outcome = if success {
            SettlementOutcome::Success {
                provider_reference: format!("{}_{}", tx.provider.as_str(), generate_reference(16)),
            }
        } else {
            SettlementOutcome::Failure
        };

        let settled = self
            .store
            .settle_deposit(DepositSettlement {
                transaction_id,
                outcome,
            })
            .await?;

        match settled {
            DepositOutcome::Missing => Err(Error::NotFound("Transaction not found".to_string())),
            DepositOutcome::Funded { transaction, job } => {
                tracing::info!(
                    job_id = %job.id,
                    transaction_id = %transaction.id,
                    "escrow funded"
                );
                self.notifications.emit(
                    NotificationSignal::to(
                        job.client_id,
                        NotificationKind::EscrowFunded,
                        "Escrow funded",
                        format!("Payment received. \"{}\" is now open for submissions.", job.title),
                    )
                    .with_link(format!("/jobs/{}", job.id)),
                );
                Ok(ConfirmResult {
                    transaction,
                    job: Some(job),
                    replayed: false,
                })
            }
            DepositOutcome::Declined(transaction) => {
                tracing::info!(transaction_id = %transaction.id, "escrow deposit declined");
                let job = self.store.find_job(transaction.job_id).await?;
                Ok(ConfirmResult {
                    transaction,
                    job,
                    replayed: false,
                })
            }
            DepositOutcome::AlreadySettled(transaction) => self.replay(transaction, success).await,
            DepositOutcome::JobConflict(transaction) => {
                tracing::warn!(
                    job_id = %transaction.job_id,
                    transaction_id = %transaction.id,
                    "deposit cleared for a job that is no longer fundable"
                );
                Err(Error::InvalidState(
                    "Job is no longer awaiting funding; the payment was marked failed".to_string(),
                ))
            }
        }
    }

    async fn replay(&self, tx: Transaction, success: bool) -> Result<ConfirmResult> {
        let same_outcome = match tx.status {
            TransactionStatus::Completed => success,
            TransactionStatus::Failed => !success,
            _ => false,
        };
        if !same_outcome {
            return Err(Error::InvalidState(format!(
                "Transaction has already been {}",
                tx.status.as_str()
            )));
        }
        tracing::debug!(transaction_id = %tx.id, "payment confirmation replayed");
        let job = self.store.find_job(tx.job_id).await?;
        Ok(ConfirmResult {
            transaction: tx,
            job,
            replayed: true,
        })
    }

    pub async fn release_escrow(
        &self,
        actor: &Actor,
        job_id: Uuid,
        submission_id: Uuid,
    ) -> Result<ReleaseRecord> {
        let job = located(self.store.find_job(job_id).await?, "Job not found")?;
        authorization::can_release_escrow(actor, &job)?;
        let submission = located(
            self.store.find_submission(submission_id).await?,
            "Submission not found",
        )?;
        lifecycle::releasable_submission(&job, &submission)?;
        lifecycle::next_job_status(job.status, JobTrigger::EscrowRelease)?;

        let released = self
            .store
            .release_escrow(EscrowRelease {
                job_id: job.id,
                client_id: job.client_id,
                expected_job_status: job.status,
                submission_id: submission.id,
                expected_submission_status: submission.status,
                freelancer_id: submission.freelancer_id,
                amount: job.budget,
                currency: job.currency,
            })
            .await?;

        let Some(record) = released else {
            let current = self.store.find_job(job.id).await?;
            let message = match current.map(|j| j.escrow_status) {
                Some(EscrowStatus::Released) => "Escrow has already been released",
                _ => "Job or submission changed while releasing escrow",
            };
            return Err(Error::InvalidState(message.to_string()));
        };

        tracing::info!(
            job_id = %record.job.id,
            submission_id = %record.submission.id,
            transaction_id = %record.transaction.id,
            amount = %record.transaction.amount,
            "escrow released"
        );
        self.notifications.emit(
            NotificationSignal::to(
                record.submission.freelancer_id,
                NotificationKind::PaymentReceived,
                "Payment released",
                format!(
                    "{} {} for \"{}\" has been released to you.",
                    record.transaction.amount,
                    record.transaction.currency.as_str(),
                    record.job.title
                ),
            )
            .with_link(format!("/jobs/{}", record.job.id)),
        );
        Ok(record)
    }

    pub async fn get_transaction(&self, actor: &Actor, id: Uuid) -> Result<Transaction> {
        let tx = located(self.store.find_transaction(id).await?, "Transaction not found")?;
        let job = located(self.store.find_job(tx.job_id).await?, "Job not found")?;
        authorization::can_view_transaction(actor, &tx, job.client_id)?;
        Ok(tx)
    }

    pub async fn history(&self, actor: &Actor, query: PaymentHistoryQuery) -> Result<Vec<Transaction>> {
        let filter = TransactionFilter {
            party: (!actor.is_admin()).then_some(actor.id),
            status: query.status,
            kind: query.kind,
        };
        self.store.list_transactions(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::store::MockMarketplaceStore;
    use crate::error::ErrorKind;
    use crate::models::job::JobStatus;
    use crate::models::submission::SubmissionStatus;
    use crate::models::user::Role;
    use crate::services::presence_service::PresenceService;
    use crate::services::test_support::{sample_job, sample_submission, Fixture};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn fund_then_confirm_funds_the_job() {
        let fx = Fixture::new().await;
        let job = fx.job(Decimal::new(1000, 0)).await;

        let funded = fx
            .escrow
            .fund_escrow(&fx.client, job.id, PaymentProvider::Konnect)
            .await
            .unwrap();
        assert_eq!(funded.breakdown.processor_fee, Decimal::new(20, 0));
        assert_eq!(funded.breakdown.total, Decimal::new(1020, 0));
        assert!(funded
            .payment_url
            .starts_with(&format!("http://localhost:5173/mock-payment/{}", funded.transaction_id)));
        assert!(funded.payment_url.contains("provider=konnect"));

        let job_before = fx.store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job_before.escrow_status, EscrowStatus::Unfunded);

        let confirmed = fx
            .escrow
            .confirm_payment(funded.transaction_id, "success")
            .await
            .unwrap();
        assert_eq!(confirmed.transaction.status, TransactionStatus::Completed);
        assert!(confirmed
            .transaction
            .provider_transaction_id
            .as_deref()
            .is_some_and(|r| r.starts_with("konnect_")));
        let job = confirmed.job.unwrap();
        assert_eq!(job.escrow_status, EscrowStatus::Funded);
        assert_eq!(job.status, JobStatus::Open);
    }

    #[tokio::test]
    async fn confirmation_is_idempotent_and_rejects_contradictions() {
        let fx = Fixture::new().await;
        let job = fx.job(Decimal::new(200, 0)).await;
        let funded = fx
            .escrow
            .fund_escrow(&fx.client, job.id, PaymentProvider::Stripe)
            .await
            .unwrap();

        let first = fx.escrow.confirm_payment(funded.transaction_id, "success").await.unwrap();
        let second = fx.escrow.confirm_payment(funded.transaction_id, "success").await.unwrap();
        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(
            first.transaction.provider_transaction_id,
            second.transaction.provider_transaction_id
        );

        let err = fx
            .escrow
            .confirm_payment(funded.transaction_id, "failed")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn failed_payment_leaves_job_unfunded() {
        let fx = Fixture::new().await;
        let job = fx.job(Decimal::new(200, 0)).await;
        let funded = fx
            .escrow
            .fund_escrow(&fx.client, job.id, PaymentProvider::Zitouna)
            .await
            .unwrap();

        let result = fx.escrow.confirm_payment(funded.transaction_id, "cancelled").await.unwrap();
        assert_eq!(result.transaction.status, TransactionStatus::Failed);
        assert_eq!(result.job.unwrap().escrow_status, EscrowStatus::Unfunded);

        // The client may start over with a fresh deposit.
        assert!(fx
            .escrow
            .fund_escrow(&fx.client, job.id, PaymentProvider::Zitouna)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx.escrow.confirm_payment(Uuid::new_v4(), "success").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn funded_job_cannot_be_funded_again() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(500, 0)).await;
        let err = fx
            .escrow
            .fund_escrow(&fx.client, job.id, PaymentProvider::Konnect)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn only_one_of_two_pending_deposits_can_fund() {
        let fx = Fixture::new().await;
        let job = fx.job(Decimal::new(500, 0)).await;
        let a = fx.escrow.fund_escrow(&fx.client, job.id, PaymentProvider::Gpg).await.unwrap();
        let b = fx.escrow.fund_escrow(&fx.client, job.id, PaymentProvider::Gpg).await.unwrap();

        fx.escrow.confirm_payment(a.transaction_id, "success").await.unwrap();
        let err = fx.escrow.confirm_payment(b.transaction_id, "success").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let completed = fx
            .store
            .list_transactions(&TransactionFilter {
                status: Some(TransactionStatus::Completed),
                kind: Some(TransactionKind::EscrowDeposit),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn release_pays_the_full_budget_and_completes_everything() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(1000, 0)).await;
        let submission = fx.submission(&job).await;

        let record = fx
            .escrow
            .release_escrow(&fx.client, job.id, submission.id)
            .await
            .unwrap();
        assert_eq!(record.transaction.kind, TransactionKind::EscrowRelease);
        assert_eq!(record.transaction.status, TransactionStatus::Completed);
        assert_eq!(record.transaction.amount, Decimal::new(1000, 0));
        assert_eq!(record.transaction.fees, TransactionFees::zero());
        assert_eq!(record.transaction.receiver_id, Some(fx.freelancer.id));
        assert_eq!(record.job.status, JobStatus::Completed);
        assert_eq!(record.job.escrow_status, EscrowStatus::Released);
        assert_eq!(record.submission.status, SubmissionStatus::Accepted);

        let freelancer = fx.store.find_user(fx.freelancer.id).await.unwrap().unwrap();
        assert_eq!(freelancer.total_earned, Decimal::new(1000, 0));
        assert_eq!(freelancer.total_jobs_completed, 1);

        let err = fx
            .escrow
            .release_escrow(&fx.client, job.id, submission.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn release_after_legacy_acceptance_does_not_double_count() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(300, 0)).await;
        let submission = fx.submission(&job).await;
        fx.submissions
            .update_status(
                &fx.client,
                submission.id,
                SubmissionStatus::Accepted,
                None,
            )
            .await
            .unwrap();

        let record = fx
            .escrow
            .release_escrow(&fx.client, job.id, submission.id)
            .await
            .unwrap();
        assert_eq!(record.job.status, JobStatus::Completed);

        let freelancer = fx.store.find_user(fx.freelancer.id).await.unwrap().unwrap();
        assert_eq!(freelancer.total_jobs_completed, 1);
        assert_eq!(freelancer.total_earned, Decimal::new(300, 0));
    }

    #[tokio::test]
    async fn non_owner_cannot_fund_or_release() {
        let fx = Fixture::new().await;
        let other = fx.user(Role::Client, "other@example.com").await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let submission = fx.submission(&job).await;

        let err = fx
            .escrow
            .fund_escrow(&other, job.id, PaymentProvider::Konnect)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = fx
            .escrow
            .release_escrow(&other, job.id, submission.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn transaction_visibility() {
        let fx = Fixture::new().await;
        let job = fx.job(Decimal::new(100, 0)).await;
        let funded = fx
            .escrow
            .fund_escrow(&fx.client, job.id, PaymentProvider::Paymaster)
            .await
            .unwrap();

        let tx = fx.escrow.get_transaction(&fx.client, funded.transaction_id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        let err = fx
            .escrow
            .get_transaction(&fx.freelancer, funded.transaction_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let history = fx
            .escrow
            .history(&fx.client, PaymentHistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        let history = fx
            .escrow
            .history(&fx.freelancer, PaymentHistoryQuery::default())
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn store_failure_during_release_surfaces_as_unexpected() {
        let client = Actor::new(Uuid::new_v4(), Role::Client);
        let freelancer_id = Uuid::new_v4();
        let mut job = sample_job(client.id);
        job.escrow_status = EscrowStatus::Funded;
        let submission = sample_submission(job.id, freelancer_id);

        let mut store = MockMarketplaceStore::new();
        let found_job = job.clone();
        store
            .expect_find_job()
            .returning(move |_| Ok(Some(found_job.clone())));
        let found_submission = submission.clone();
        store
            .expect_find_submission()
            .returning(move |_| Ok(Some(found_submission.clone())));
        store
            .expect_release_escrow()
            .times(1)
            .returning(|_| Err(Error::Internal("connection reset".to_string())));

        let store: Arc<dyn MarketplaceStore> = Arc::new(store);
        let notifications =
            NotificationService::new(store.clone(), PresenceService::new(), None, "s".into());
        let escrow = EscrowService::new(store, notifications, "http://localhost:5173".into());

        let err = escrow
            .release_escrow(&client, job.id, submission.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }
}
