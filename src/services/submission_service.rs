use std::sync::Arc;
use uuid::Uuid;

use crate::database::store::{LegacyAcceptance, MarketplaceStore, SubmissionFilter, SubmissionRating};
use crate::dto::submission_dto::{CreateSubmissionPayload, RateSubmissionPayload};
use crate::error::{Error, Result};
use crate::models::{
    job::{Job, JobExpectation},
    notification::NotificationKind,
    submission::{NewSubmission, Submission, SubmissionStatus},
    user::Role,
};
use crate::services::authorization::{self, located, Actor};
use crate::services::lifecycle::{self, JobTrigger};
use crate::services::notification_service::{NotificationService, NotificationSignal};

#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn MarketplaceStore>,
    notifications: NotificationService,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn MarketplaceStore>, notifications: NotificationService) -> Self {
        Self {
            store,
            notifications,
        }
    }

    async fn load(&self, id: Uuid) -> Result<(Submission, Job)> {
        let submission = located(self.store.find_submission(id).await?, "Submission not found")?;
        let job = located(self.store.find_job(submission.job_id).await?, "Job not found")?;
        Ok((submission, job))
    }

    pub async fn create(&self, actor: &Actor, payload: CreateSubmissionPayload) -> Result<Submission> {
        let job = located(self.store.find_job(payload.job_id).await?, "Job not found")?;
        let already_submitted = self.store.submission_exists(job.id, actor.id).await?;
        authorization::can_create_submission(actor, &job, already_submitted)?;

        let submission = self
            .store
            .insert_submission(NewSubmission {
                job_id: job.id,
                freelancer_id: actor.id,
                description: payload.description,
                attachments: payload.attachments,
            })
            .await?;

        tracing::info!(submission_id = %submission.id, job_id = %job.id, freelancer_id = %actor.id, "submission created");
        self.notifications.emit(
            NotificationSignal::to(
                job.client_id,
                NotificationKind::SubmissionReceived,
                "New submission",
                format!("A freelancer submitted work for \"{}\".", job.title),
            )
            .with_link(format!("/jobs/{}", job.id)),
        );
        Ok(submission)
    }

    pub async fn list_for_job(&self, actor: &Actor, job_id: Uuid) -> Result<Vec<Submission>> {
        let job = located(self.store.find_job(job_id).await?, "Job not found")?;
        let scope = authorization::can_view_submissions(actor, &job)?;
        self.store
            .list_submissions(&SubmissionFilter {
                job_id: Some(job.id),
                freelancer_id: scope.freelancer(),
                status: None,
            })
            .await
    }

    pub async fn my_submissions(
        &self,
        actor: &Actor,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<Submission>> {
        if actor.role != Role::Freelancer {
            return Err(Error::Forbidden(
                "Only freelancers have submissions".to_string(),
            ));
        }
        self.store
            .list_submissions(&SubmissionFilter {
                job_id: None,
                freelancer_id: Some(actor.id),
                status,
            })
            .await
    }

    /// Status changes by the job owner. Moving to `accepted` here is the
    /// direct acceptance path and also moves the job to `in_progress`.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        next: SubmissionStatus,
        feedback: Option<String>,
    ) -> Result<Submission> {
        let (submission, job) = self.load(id).await?;
        authorization::can_mutate_submission_status(actor, &job)?;
        lifecycle::check_submission_transition(submission.status, next)?;

        let updated = if next == SubmissionStatus::Accepted {
            lifecycle::next_job_status(job.status, JobTrigger::LegacyAcceptance)?;
            if lifecycle::legacy_acceptance_gap(&job) {
                tracing::warn!(
                    job_id = %job.id,
                    submission_id = %submission.id,
                    escrow_status = ?job.escrow_status,
                    "submission accepted directly on a job without funded escrow"
                );
            }
            let (accepted, _) = self
                .store
                .accept_submission(LegacyAcceptance {
                    submission_id: submission.id,
                    expected_status: submission.status,
                    job_id: job.id,
                    expected_job: JobExpectation::of(&job),
                    freelancer_id: submission.freelancer_id,
                    feedback,
                })
                .await?
                .ok_or_else(|| {
                    Error::InvalidState("Submission or job changed; reload and try again".to_string())
                })?;
            accepted
        } else {
            self.store
                .update_submission_status_if(submission.id, submission.status, next, feedback)
                .await?
                .ok_or_else(|| {
                    Error::InvalidState("Submission changed; reload and try again".to_string())
                })?
        };

        tracing::info!(
            submission_id = %updated.id,
            from = submission.status.as_str(),
            to = updated.status.as_str(),
            "submission status changed"
        );

        let (kind, title) = match updated.status {
            SubmissionStatus::Approved | SubmissionStatus::Accepted => {
                (NotificationKind::SubmissionApproved, "Submission approved")
            }
            SubmissionStatus::Rejected => (NotificationKind::SubmissionRejected, "Submission rejected"),
            SubmissionStatus::RevisionRequested => (NotificationKind::System, "Revision requested"),
            SubmissionStatus::Pending => (NotificationKind::System, "Submission reopened"),
        };
        self.notifications.emit(
            NotificationSignal::to(
                updated.freelancer_id,
                kind,
                title,
                format!(
                    "Your submission for \"{}\" is now {}.",
                    job.title,
                    updated.status.as_str().replace('_', " ")
                ),
            )
            .with_link(format!("/jobs/{}", job.id)),
        );
        Ok(updated)
    }

    /// Attaches the client's rating and recomputes the freelancer's average
    /// from every rated submission.
    pub async fn rate(&self, actor: &Actor, id: Uuid, payload: RateSubmissionPayload) -> Result<Submission> {
        let (submission, job) = self.load(id).await?;
        authorization::can_rate_submission(actor, &job, &submission)?;

        let rated = self
            .store
            .rate_submission(SubmissionRating {
                submission_id: submission.id,
                rating: payload.rating,
                review: payload.review,
            })
            .await?
            .ok_or_else(|| Error::InvalidState("Submission has already been rated".to_string()))?;

        tracing::info!(freelancer_id = %rated.submission.freelancer_id, rating = %rated.freelancer_rating, "freelancer rating recomputed");
        Ok(rated.submission)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let submission = located(self.store.find_submission(id).await?, "Submission not found")?;
        authorization::can_delete_submission(actor, &submission)?;
        if !self.store.delete_submission_if(submission.id, submission.status).await? {
            return Err(Error::InvalidState(
                "Submission changed; reload and try again".to_string(),
            ));
        }
        tracing::info!(submission_id = %submission.id, actor = %actor.id, "submission deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::job::{EscrowStatus, JobStatus};
    use crate::services::test_support::Fixture;
    use rust_decimal::Decimal;

    fn work(job_id: Uuid) -> CreateSubmissionPayload {
        CreateSubmissionPayload {
            job_id,
            description: "Here is the finished work with documentation".into(),
            attachments: vec![],
        }
    }

    fn rating(value: i16) -> RateSubmissionPayload {
        RateSubmissionPayload {
            rating: value,
            review: None,
        }
    }

    #[tokio::test]
    async fn submissions_need_a_funded_open_job_and_are_unique() {
        let fx = Fixture::new().await;
        let unfunded = fx.job(Decimal::new(100, 0)).await;
        let err = fx.submissions.create(&fx.freelancer, work(unfunded.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let funded = fx.funded_job(Decimal::new(100, 0)).await;
        fx.submissions.create(&fx.freelancer, work(funded.id)).await.unwrap();
        let err = fx.submissions.create(&fx.freelancer, work(funded.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = fx.submissions.create(&fx.client, work(funded.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn freelancers_only_see_their_own_submissions() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let other = fx.user(Role::Freelancer, "second@example.com").await;
        fx.submissions.create(&fx.freelancer, work(job.id)).await.unwrap();
        fx.submissions.create(&other, work(job.id)).await.unwrap();

        assert_eq!(fx.submissions.list_for_job(&fx.client, job.id).await.unwrap().len(), 2);
        let own = fx.submissions.list_for_job(&other, job.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].freelancer_id, other.id);

        let mine = fx.submissions.my_submissions(&fx.freelancer, None).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn direct_acceptance_moves_job_in_progress() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let submission = fx.submission(&job).await;

        let accepted = fx
            .submissions
            .update_status(&fx.client, submission.id, SubmissionStatus::Accepted, Some("Great".into()))
            .await
            .unwrap();
        assert_eq!(accepted.status, SubmissionStatus::Accepted);
        assert_eq!(accepted.client_feedback.as_deref(), Some("Great"));

        let job = fx.store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.escrow_status, EscrowStatus::Funded);
        let freelancer = fx.store.find_user(fx.freelancer.id).await.unwrap().unwrap();
        assert_eq!(freelancer.total_jobs_completed, 1);

        let err = fx
            .submissions
            .update_status(&fx.client, submission.id, SubmissionStatus::Rejected, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn only_owner_or_admin_changes_status() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let submission = fx.submission(&job).await;

        let err = fx
            .submissions
            .update_status(&fx.freelancer, submission.id, SubmissionStatus::Approved, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let updated = fx
            .submissions
            .update_status(&fx.admin, submission.id, SubmissionStatus::RevisionRequested, None)
            .await
            .unwrap();
        assert_eq!(updated.status, SubmissionStatus::RevisionRequested);
    }

    #[tokio::test]
    async fn rating_recomputes_the_mean_and_is_single_shot() {
        let fx = Fixture::new().await;
        let mut rated = Vec::new();
        for value in [5, 4, 4] {
            let job = fx.funded_job(Decimal::new(100, 0)).await;
            let submission = fx.submission(&job).await;
            fx.escrow.release_escrow(&fx.client, job.id, submission.id).await.unwrap();
            fx.submissions.rate(&fx.client, submission.id, rating(value)).await.unwrap();
            rated.push(submission.id);
        }

        let freelancer = fx.store.find_user(fx.freelancer.id).await.unwrap().unwrap();
        assert_eq!(freelancer.rating, Decimal::new(433, 2));

        let err = fx.submissions.rate(&fx.client, rated[0], rating(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn pending_submission_cannot_be_rated() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let submission = fx.submission(&job).await;
        let err = fx.submissions.rate(&fx.client, submission.id, rating(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn deletion_only_while_pending() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let submission = fx.submission(&job).await;
        fx.submissions
            .update_status(&fx.client, submission.id, SubmissionStatus::Approved, None)
            .await
            .unwrap();

        let err = fx.submissions.delete(&fx.freelancer, submission.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        fx.submissions.delete(&fx.admin, submission.id).await.unwrap();

        let missing = fx.submissions.delete(&fx.admin, submission.id).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }
}
