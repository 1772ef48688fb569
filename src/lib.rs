pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::MarketplaceStore;
use crate::services::{
    auth_service::AuthService, escrow_service::EscrowService, job_service::JobService,
    message_service::MessageService, notification_service::NotificationService,
    presence_service::PresenceService, submission_service::SubmissionService,
    user_service::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn MarketplaceStore>,
    pub presence: PresenceService,
    pub notification_service: NotificationService,
    pub auth_service: AuthService,
    pub job_service: JobService,
    pub submission_service: SubmissionService,
    pub escrow_service: EscrowService,
    pub message_service: MessageService,
    pub user_service: UserService,
}

impl AppState {
    pub fn new(store: Arc<dyn MarketplaceStore>, config: Config) -> Self {
        let presence = PresenceService::new();
        let notification_service = NotificationService::new(
            store.clone(),
            presence.clone(),
            config.notification_relay_url.clone(),
            config.webhook_secret.clone(),
        );
        let auth_service =
            AuthService::new(store.clone(), config.jwt_secret.clone(), config.jwt_ttl_hours);
        let job_service = JobService::new(store.clone(), notification_service.clone());
        let submission_service =
            SubmissionService::new(store.clone(), notification_service.clone());
        let escrow_service = EscrowService::new(
            store.clone(),
            notification_service.clone(),
            config.frontend_url.clone(),
        );
        let message_service = MessageService::new(
            store.clone(),
            presence.clone(),
            notification_service.clone(),
        );
        let user_service = UserService::new(store.clone());

        Self {
            config: Arc::new(config),
            store,
            presence,
            notification_service,
            auth_service,
            job_service,
            submission_service,
            escrow_service,
            message_service,
            user_service,
        }
    }
}
