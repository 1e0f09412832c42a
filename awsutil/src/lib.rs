//! Command-line helpers for SQS queues, SNS topics and Secrets Manager.

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod publish;
pub mod receive;
pub mod secrets;
pub mod sns;
pub mod sqs;

pub use error::{AppError, AppResult};
