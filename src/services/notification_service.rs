use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::database::MarketplaceStore;
use crate::error::{Error, Result};
use crate::models::notification::{NewNotification, Notification, NotificationKind};
use crate::services::authorization::Actor;
use crate::services::presence_service::{PresenceService, PushEvent};

/// "These users should be told about X."
#[derive(Debug, Clone)]
pub struct NotificationSignal {
    pub recipients: Vec<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationSignal {
    pub fn to(recipient: Uuid, kind: NotificationKind, title: &str, message: String) -> Self {
        Self {
            recipients: vec![recipient],
            kind,
            title: title.to_string(),
            message,
            link: None,
        }
    }

    pub fn with_link(mut self, link: String) -> Self {
        self.link = Some(link);
        self
    }
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn MarketplaceStore>,
    presence: PresenceService,
    client: Client,
    relay_url: Option<String>,
    webhook_secret: String,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        presence: PresenceService,
        relay_url: Option<String>,
        webhook_secret: String,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            store,
            presence,
            client,
            relay_url,
            webhook_secret,
        }
    }

    /// Fire-and-forget delivery; callers never wait on it.
    pub fn emit(&self, signal: NotificationSignal) {
        let service = self.clone();
        tokio::spawn(async move {
            let kind = signal.kind.as_str();
            if let Err(e) = service.deliver(signal).await {
                tracing::warn!(error = ?e, kind, "notification delivery failed");
            }
        });
    }

    pub async fn deliver(&self, signal: NotificationSignal) -> Result<Vec<Notification>> {
        let mut delivered = Vec::with_capacity(signal.recipients.len());
        for recipient in &signal.recipients {
            let notification = self
                .store
                .insert_notification(NewNotification {
                    user_id: *recipient,
                    kind: signal.kind,
                    title: signal.title.clone(),
                    message: signal.message.clone(),
                    link: signal.link.clone(),
                })
                .await?;

            let sessions = self.presence.push(
                *recipient,
                PushEvent::new("notification", serde_json::to_value(&notification)?),
            );
            tracing::debug!(user_id = %recipient, sessions, kind = signal.kind.as_str(), "notification stored");

            if let Some(url) = &self.relay_url {
                self.relay(url, &notification).await;
            }
            delivered.push(notification);
        }
        Ok(delivered)
    }

    async fn relay(&self, url: &str, notification: &Notification) {
        let res = self
            .client
            .post(url)
            .header("X-Webhook-Secret", &self.webhook_secret)
            .json(&json!({
                "event": "notification",
                "user_id": notification.user_id,
                "notification": notification,
            }))
            .send()
            .await;
        match res {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => tracing::warn!(status = %resp.status(), "notification relay rejected event"),
            Err(e) => tracing::warn!(error = ?e, "notification relay unreachable"),
        }
    }

    pub async fn list(&self, actor: &Actor, unread_only: bool) -> Result<Vec<Notification>> {
        self.store.list_notifications(actor.id, unread_only).await
    }

    pub async fn mark_read(&self, actor: &Actor, id: Uuid) -> Result<Notification> {
        self.store
            .mark_notification_read(id, actor.id)
            .await?
            .ok_or_else(|| Error::NotFound("Notification not found".to_string()))
    }
}
