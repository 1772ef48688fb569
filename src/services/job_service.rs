use std::sync::Arc;
use uuid::Uuid;

use crate::database::store::{JobFilter, MarketplaceStore};
use crate::dto::job_dto::{
    CreateJobPayload, JobDetailResponse, JobListQuery, JobListResponse, Pagination,
    UpdateJobPayload,
};
use crate::error::{Error, Result};
use crate::models::{
    job::{Currency, Job, JobChanges, JobExpectation, NewJob, PaymentProvider},
    notification::NotificationKind,
};
use crate::services::authorization::{self, located, Actor, JobAction};
use crate::services::lifecycle::{self, JobTrigger};
use crate::services::notification_service::{NotificationService, NotificationSignal};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_OWN_JOBS: i64 = 500;

#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn MarketplaceStore>,
    notifications: NotificationService,
}

impl JobService {
    pub fn new(store: Arc<dyn MarketplaceStore>, notifications: NotificationService) -> Self {
        Self {
            store,
            notifications,
        }
    }

    pub async fn create(&self, actor: &Actor, payload: CreateJobPayload) -> Result<Job> {
        authorization::can_create_job(actor)?;

        let job = self
            .store
            .insert_job(NewJob {
                client_id: actor.id,
                title: payload.title.trim().to_string(),
                description: payload.description,
                category: payload.category.trim().to_string(),
                budget: payload.budget,
                currency: payload.currency.unwrap_or(Currency::Tnd),
                payment_provider: PaymentProvider::Konnect,
                deadline: payload.deadline,
                required_skills: payload.required_skills,
                location: payload.location,
                location_required: payload.location_required,
            })
            .await?;

        tracing::info!(job_id = %job.id, client_id = %actor.id, budget = %job.budget, "job created");
        self.notifications.emit(
            NotificationSignal::to(
                actor.id,
                NotificationKind::JobPosted,
                "Job posted",
                format!("\"{}\" was posted. Fund escrow to start receiving submissions.", job.title),
            )
            .with_link(format!("/jobs/{}", job.id)),
        );
        Ok(job)
    }

    pub async fn list(&self, query: JobListQuery) -> Result<JobListResponse> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let filter = JobFilter {
            status: query.status,
            category: query.category.filter(|c| !c.trim().is_empty()),
            min_budget: query.min_budget,
            max_budget: query.max_budget,
            search: query.search.filter(|s| !s.trim().is_empty()),
            client_id: None,
            page,
            limit,
        };

        let (jobs, total) = self.store.list_jobs(&filter).await?;
        Ok(JobListResponse {
            jobs,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: (total + limit - 1) / limit,
            },
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<JobDetailResponse> {
        let job = located(self.store.find_job(id).await?, "Job not found")?;
        let submission_count = self.store.count_submissions(job.id).await?;
        Ok(JobDetailResponse {
            job,
            submission_count,
        })
    }

    pub async fn my_posted(&self, actor: &Actor) -> Result<Vec<Job>> {
        authorization::can_create_job(actor)?;
        let filter = JobFilter {
            client_id: Some(actor.id),
            page: 1,
            limit: MAX_OWN_JOBS,
            ..Default::default()
        };
        let (jobs, _) = self.store.list_jobs(&filter).await?;
        Ok(jobs)
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, payload: UpdateJobPayload) -> Result<Job> {
        let job = located(self.store.find_job(id).await?, "Job not found")?;
        authorization::can_mutate_job(actor, &job, JobAction::Update)?;
        let changes = JobChanges::from(payload);
        lifecycle::check_job_editable(&job, &changes)?;

        let updated = self
            .store
            .update_job_if(job.id, JobExpectation::of(&job), changes)
            .await?
            .ok_or_else(|| {
                Error::InvalidState("Job changed while it was being edited".to_string())
            })?;
        tracing::info!(job_id = %updated.id, actor = %actor.id, "job updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let job = located(self.store.find_job(id).await?, "Job not found")?;
        authorization::can_mutate_job(actor, &job, JobAction::Delete)?;
        lifecycle::check_job_removable(&job)?;

        let history = || {
            Error::InvalidState(
                "Job has payment, submission or message history; cancel it instead".to_string(),
            )
        };
        if self.store.job_has_history(job.id).await? {
            return Err(history());
        }
        if !self.store.delete_job_if(job.id, JobExpectation::of(&job)).await? {
            return Err(history());
        }
        tracing::info!(job_id = %job.id, actor = %actor.id, "job deleted");
        Ok(())
    }

    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<Job> {
        let job = located(self.store.find_job(id).await?, "Job not found")?;
        authorization::can_mutate_job(actor, &job, JobAction::Cancel)?;
        lifecycle::check_job_removable(&job)?;
        let next = lifecycle::next_job_status(job.status, JobTrigger::Cancellation)?;

        let changes = JobChanges {
            status: Some(next),
            ..Default::default()
        };
        let cancelled = self
            .store
            .update_job_if(job.id, JobExpectation::of(&job), changes)
            .await?
            .ok_or_else(|| Error::InvalidState("Job changed while it was being cancelled".to_string()))?;
        tracing::info!(job_id = %cancelled.id, actor = %actor.id, "job cancelled");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::job::{EscrowStatus, JobStatus};
    use crate::models::user::Role;
    use crate::services::test_support::Fixture;
    use rust_decimal::Decimal;

    fn payload(title: &str, budget: i64) -> CreateJobPayload {
        CreateJobPayload {
            title: title.to_string(),
            description: "A reasonably detailed description of the work".to_string(),
            category: "web".to_string(),
            budget: Decimal::new(budget, 0),
            currency: None,
            deadline: None,
            required_skills: vec!["rust".into()],
            location: None,
            location_required: false,
        }
    }

    #[tokio::test]
    async fn create_starts_open_and_unfunded() {
        let fx = Fixture::new().await;
        let job = fx.jobs.create(&fx.client, payload("Build an API", 250)).await.unwrap();
        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(job.escrow_status, EscrowStatus::Unfunded);
        assert_eq!(job.currency, Currency::Tnd);

        let client = fx.store.find_user(fx.client.id).await.unwrap().unwrap();
        assert_eq!(client.total_jobs_posted, 1);

        let err = fx
            .jobs
            .create(&fx.freelancer, payload("Build an API", 250))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let fx = Fixture::new().await;
        for i in 0..3 {
            fx.jobs
                .create(&fx.client, payload(&format!("Logo design {}", i), 100 + i))
                .await
                .unwrap();
        }
        fx.jobs.create(&fx.client, payload("Mobile app", 5000)).await.unwrap();

        let page = fx
            .jobs
            .list(JobListQuery {
                search: Some("logo".into()),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.jobs.len(), 2);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.pages, 2);

        let expensive = fx
            .jobs
            .list(JobListQuery {
                min_budget: Some(Decimal::new(1000, 0)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(expensive.jobs.len(), 1);
        assert_eq!(expensive.jobs[0].title, "Mobile app");
    }

    #[tokio::test]
    async fn budget_is_frozen_after_funding() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(400, 0)).await;

        let err = fx
            .jobs
            .update(
                &fx.client,
                job.id,
                UpdateJobPayload {
                    budget: Some(Decimal::new(800, 0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let updated = fx
            .jobs
            .update(
                &fx.client,
                job.id,
                UpdateJobPayload {
                    title: Some("Updated title".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Updated title");
    }

    #[tokio::test]
    async fn delete_and_cancel_rules() {
        let fx = Fixture::new().await;
        let fresh = fx.job(Decimal::new(100, 0)).await;
        fx.jobs.delete(&fx.client, fresh.id).await.unwrap();
        assert!(fx.store.find_job(fresh.id).await.unwrap().is_none());

        let funded = fx.funded_job(Decimal::new(100, 0)).await;
        let err = fx.jobs.delete(&fx.client, funded.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = fx.jobs.cancel(&fx.client, funded.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let other = fx.user(Role::Client, "intruder@example.com").await;
        let unfunded = fx.job(Decimal::new(100, 0)).await;
        let err = fx.jobs.cancel(&other, unfunded.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let cancelled = fx.jobs.cancel(&fx.admin, unfunded.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        let err = fx.jobs.delete(&fx.client, unfunded.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn job_with_failed_deposit_must_be_cancelled_not_deleted() {
        let fx = Fixture::new().await;
        let job = fx.job(Decimal::new(100, 0)).await;
        let deposit = fx
            .escrow
            .fund_escrow(&fx.client, job.id, PaymentProvider::Konnect)
            .await
            .unwrap();
        fx.escrow.confirm_payment(deposit.transaction_id, "failed").await.unwrap();

        let err = fx.jobs.delete(&fx.client, job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(fx.jobs.cancel(&fx.client, job.id).await.is_ok());
    }
}
