pub mod job;
pub mod message;
pub mod notification;
pub mod submission;
pub mod transaction;
pub mod user;
