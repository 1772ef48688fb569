use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JobPosted,
    SubmissionReceived,
    SubmissionApproved,
    SubmissionRejected,
    PaymentReceived,
    EscrowFunded,
    MessageReceived,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::JobPosted => "job_posted",
            NotificationKind::SubmissionReceived => "submission_received",
            NotificationKind::SubmissionApproved => "submission_approved",
            NotificationKind::SubmissionRejected => "submission_rejected",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::EscrowFunded => "escrow_funded",
            NotificationKind::MessageReceived => "message_received",
            NotificationKind::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}
