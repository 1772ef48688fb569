use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::MarketplaceStore;
use crate::dto::message_dto::{ConversationSummary, SendMessagePayload};
use crate::error::{Error, Result};
use crate::models::{
    job::Job,
    message::{Message, NewMessage},
    notification::NotificationKind,
};
use crate::services::authorization::{self, located, Actor};
use crate::services::notification_service::{NotificationService, NotificationSignal};
use crate::services::presence_service::{PresenceService, PushEvent};

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn MarketplaceStore>,
    presence: PresenceService,
    notifications: NotificationService,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        presence: PresenceService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            presence,
            notifications,
        }
    }

    async fn participant(&self, job: &Job, user_id: Uuid) -> Result<bool> {
        Ok(job.client_id == user_id || self.store.submission_exists(job.id, user_id).await?)
    }

    pub async fn send(&self, actor: &Actor, payload: SendMessagePayload) -> Result<Message> {
        let job = located(self.store.find_job(payload.job_id).await?, "Job not found")?;
        let has_submission = self.store.submission_exists(job.id, actor.id).await?;
        authorization::can_send_message(actor, &job, has_submission)?;

        if payload.receiver_id == actor.id {
            return Err(Error::BadRequest("You cannot message yourself".to_string()));
        }
        located(
            self.store.find_user(payload.receiver_id).await?,
            "Recipient not found",
        )?;
        if !self.participant(&job, payload.receiver_id).await? {
            return Err(Error::BadRequest(
                "Recipient is not a participant of this job".to_string(),
            ));
        }

        let message = self
            .store
            .insert_message(NewMessage {
                job_id: job.id,
                sender_id: actor.id,
                receiver_id: payload.receiver_id,
                message_text: payload.message_text,
                attachments: payload.attachments,
            })
            .await?;

        let live = self.presence.push(
            message.receiver_id,
            PushEvent::new("message", serde_json::to_value(&message)?),
        );
        tracing::debug!(message_id = %message.id, job_id = %job.id, live_sessions = live, "message sent");

        self.notifications.emit(
            NotificationSignal::to(
                message.receiver_id,
                NotificationKind::MessageReceived,
                "New message",
                format!("New message about \"{}\".", job.title),
            )
            .with_link(format!("/messages/{}", job.id)),
        );
        Ok(message)
    }

    /// Messages of a job the actor can see. Reading marks the actor's
    /// unread messages as read.
    pub async fn job_messages(&self, actor: &Actor, job_id: Uuid) -> Result<Vec<Message>> {
        let job = located(self.store.find_job(job_id).await?, "Job not found")?;
        let has_submission = self.store.submission_exists(job.id, actor.id).await?;
        authorization::can_access_message(actor, &job, has_submission)?;

        let involved = actor.owns(&job) || has_submission;
        let party = if involved { Some(actor.id) } else { None };
        let messages = self.store.list_job_messages(job.id, party).await?;
        if involved {
            self.store.mark_messages_read(job.id, actor.id).await?;
        }
        Ok(messages)
    }

    pub async fn mark_read(&self, actor: &Actor, job_id: Uuid) -> Result<u64> {
        let job = located(self.store.find_job(job_id).await?, "Job not found")?;
        let has_submission = self.store.submission_exists(job.id, actor.id).await?;
        authorization::can_access_message(actor, &job, has_submission)?;
        self.store.mark_messages_read(job.id, actor.id).await
    }

    pub async fn unread_count(&self, actor: &Actor) -> Result<i64> {
        self.store.count_unread_messages(actor.id).await
    }

    /// Latest message and unread count per job, newest conversation first.
    pub async fn conversations(&self, actor: &Actor) -> Result<Vec<ConversationSummary>> {
        let messages = self.store.list_user_messages(actor.id).await?;

        let mut order: Vec<Uuid> = Vec::new();
        let mut latest: HashMap<Uuid, Message> = HashMap::new();
        let mut unread: HashMap<Uuid, i64> = HashMap::new();
        for message in messages {
            if message.receiver_id == actor.id && !message.is_read {
                *unread.entry(message.job_id).or_default() += 1;
            }
            if !latest.contains_key(&message.job_id) {
                order.push(message.job_id);
                latest.insert(message.job_id, message);
            }
        }

        let mut summaries = Vec::with_capacity(order.len());
        for job_id in order {
            let Some(last_message) = latest.remove(&job_id) else {
                continue;
            };
            let job_title = self.store.find_job(job_id).await?.map(|job| job.title);
            summaries.push(ConversationSummary {
                job_id,
                job_title,
                last_message,
                unread_count: unread.get(&job_id).copied().unwrap_or(0),
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::user::Role;
    use crate::services::test_support::Fixture;
    use rust_decimal::Decimal;

    fn text(job_id: Uuid, receiver_id: Uuid, body: &str) -> SendMessagePayload {
        SendMessagePayload {
            job_id,
            receiver_id,
            message_text: body.to_string(),
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn participants_exchange_messages_and_reading_clears_unread() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        fx.submission(&job).await;
        let mut session = fx.presence.connect(fx.client.id);

        fx.messages
            .send(&fx.freelancer, text(job.id, fx.client.id, "Hi, question on scope"))
            .await
            .unwrap();
        fx.messages
            .send(&fx.freelancer, text(job.id, fx.client.id, "Also the deadline"))
            .await
            .unwrap();

        let pushed = session.recv().await.unwrap();
        assert_eq!(pushed.event, "message");

        assert_eq!(fx.messages.unread_count(&fx.client).await.unwrap(), 2);
        let conversations = fx.messages.conversations(&fx.client).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].unread_count, 2);
        assert_eq!(conversations[0].last_message.message_text, "Also the deadline");

        let thread = fx.messages.job_messages(&fx.client, job.id).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(fx.messages.unread_count(&fx.client).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn outsiders_cannot_read_or_write() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let outsider = fx.user(Role::Freelancer, "outsider@example.com").await;

        let err = fx
            .messages
            .send(&outsider, text(job.id, fx.client.id, "Hello?"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = fx.messages.job_messages(&outsider, job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        assert!(fx.messages.job_messages(&fx.admin, job.id).await.is_ok());
        let err = fx
            .messages
            .send(&fx.admin, text(job.id, fx.client.id, "Admin here"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn recipient_must_take_part_in_the_job() {
        let fx = Fixture::new().await;
        let job = fx.funded_job(Decimal::new(100, 0)).await;
        let bystander = fx.user(Role::Freelancer, "bystander@example.com").await;

        let err = fx
            .messages
            .send(&fx.client, text(job.id, bystander.id, "Want to apply?"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
