use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{MarketplaceStore, MemoryStore};
use crate::dto::submission_dto::CreateSubmissionPayload;
use crate::models::{
    job::{Currency, EscrowStatus, Job, JobStatus, NewJob, PaymentProvider},
    submission::{Submission, SubmissionStatus},
    user::{NewUser, Role},
};
use crate::services::authorization::Actor;
use crate::services::escrow_service::EscrowService;
use crate::services::job_service::JobService;
use crate::services::message_service::MessageService;
use crate::services::notification_service::NotificationService;
use crate::services::presence_service::PresenceService;
use crate::services::submission_service::SubmissionService;

pub struct Fixture {
    pub store: Arc<dyn MarketplaceStore>,
    pub presence: PresenceService,
    pub jobs: JobService,
    pub submissions: SubmissionService,
    pub escrow: EscrowService,
    pub messages: MessageService,
    pub client: Actor,
    pub freelancer: Actor,
    pub admin: Actor,
}

impl Fixture {
    pub async fn new() -> Self {
        let store: Arc<dyn MarketplaceStore> = Arc::new(MemoryStore::new());
        let presence = PresenceService::new();
        let notifications =
            NotificationService::new(store.clone(), presence.clone(), None, "secret".into());

        let mut fixture = Self {
            jobs: JobService::new(store.clone(), notifications.clone()),
            submissions: SubmissionService::new(store.clone(), notifications.clone()),
            escrow: EscrowService::new(
                store.clone(),
                notifications.clone(),
                "http://localhost:5173".into(),
            ),
            messages: MessageService::new(store.clone(), presence.clone(), notifications),
            store,
            presence,
            client: Actor::new(Uuid::nil(), Role::Client),
            freelancer: Actor::new(Uuid::nil(), Role::Freelancer),
            admin: Actor::new(Uuid::nil(), Role::Admin),
        };
        fixture.client = fixture.user(Role::Client, "client@example.com").await;
        fixture.freelancer = fixture.user(Role::Freelancer, "freelancer@example.com").await;
        fixture.admin = fixture.user(Role::Admin, "admin@example.com").await;
        fixture
    }

    pub async fn user(&self, role: Role, email: &str) -> Actor {
        let user = self
            .store
            .insert_user(NewUser {
                email: email.to_string(),
                password_hash: "unused".to_string(),
                full_name: email.to_string(),
                role,
                phone: None,
                location: None,
            })
            .await
            .unwrap();
        Actor::new(user.id, user.role)
    }

    pub async fn job(&self, budget: Decimal) -> Job {
        self.store
            .insert_job(NewJob {
                client_id: self.client.id,
                title: "Company website".to_string(),
                description: "Five page marketing website with a blog".to_string(),
                category: "web".to_string(),
                budget,
                currency: Currency::Tnd,
                payment_provider: PaymentProvider::Konnect,
                deadline: None,
                required_skills: vec![],
                location: None,
                location_required: false,
            })
            .await
            .unwrap()
    }

    pub async fn funded_job(&self, budget: Decimal) -> Job {
        let job = self.job(budget).await;
        let deposit = self
            .escrow
            .fund_escrow(&self.client, job.id, PaymentProvider::Konnect)
            .await
            .unwrap();
        self.escrow
            .confirm_payment(deposit.transaction_id, "success")
            .await
            .unwrap()
            .job
            .unwrap()
    }

    pub async fn submission(&self, job: &Job) -> Submission {
        self.submissions
            .create(
                &self.freelancer,
                CreateSubmissionPayload {
                    job_id: job.id,
                    description: "Finished site deployed to the staging server".to_string(),
                    attachments: vec![],
                },
            )
            .await
            .unwrap()
    }
}

pub fn sample_job(client_id: Uuid) -> Job {
    let now = Utc::now();
    Job {
        id: Uuid::new_v4(),
        client_id,
        title: "Data cleanup".to_string(),
        description: "Clean and deduplicate a customer spreadsheet".to_string(),
        category: "data".to_string(),
        budget: Decimal::new(150, 0),
        currency: Currency::Tnd,
        status: JobStatus::Open,
        escrow_status: EscrowStatus::Unfunded,
        payment_provider: PaymentProvider::Konnect,
        deadline: None,
        required_skills: vec![],
        location: None,
        location_required: false,
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_submission(job_id: Uuid, freelancer_id: Uuid) -> Submission {
    let now = Utc::now();
    Submission {
        id: Uuid::new_v4(),
        job_id,
        freelancer_id,
        description: "Cleaned file attached".to_string(),
        attachments: vec![],
        status: SubmissionStatus::Pending,
        client_feedback: None,
        rating: None,
        review: None,
        submitted_at: now,
        created_at: now,
        updated_at: now,
    }
}
