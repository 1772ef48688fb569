pub mod auth_service;
pub mod authorization;
pub mod escrow_service;
pub mod fees;
pub mod job_service;
pub mod lifecycle;
pub mod message_service;
pub mod notification_service;
pub mod presence_service;
pub mod submission_service;
pub mod user_service;

#[cfg(test)]
pub(crate) mod test_support;
