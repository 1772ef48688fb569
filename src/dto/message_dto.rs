use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::message::Message;
use crate::utils::validation::validate_no_blank_entries;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessagePayload {
    pub job_id: Uuid,
    pub receiver_id: Uuid,
    #[validate(length(min = 1, max = 5000))]
    pub message_text: String,
    #[serde(default)]
    #[validate(custom(function = "validate_no_blank_entries"))]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub job_id: Uuid,
    pub job_title: Option<String>,
    pub last_message: Message,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}
