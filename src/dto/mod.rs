pub mod admin_dto;
pub mod auth_dto;
pub mod envelope;
pub mod job_dto;
pub mod message_dto;
pub mod notification_dto;
pub mod payment_dto;
pub mod submission_dto;
