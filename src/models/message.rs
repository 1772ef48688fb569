use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub job_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message_text: String,
    pub attachments: Vec<String>,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub job_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message_text: String,
    pub attachments: Vec<String>,
}
