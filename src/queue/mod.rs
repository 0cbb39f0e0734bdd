//! Durable notification queue
//!
//! Checkout hands jobs off here and never waits for delivery. The `mail-worker` binary
//! consumes them with at-least-once semantics.

use async_trait::async_trait;

use crate::domain::events::NotificationJob;

pub mod memory;
pub mod nats;
pub mod worker;

pub use memory::MemoryQueue;
pub use nats::JetStreamQueue;

/// Subjects are `mail.<job kind>`.
pub const SUBJECT_PREFIX: &str = "mail";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("cannot encode job: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("nats: {0}")]
    Nats(String),
    #[error("queue unavailable")]
    Unavailable,
}

pub type Result<T> = std::result::Result<T, QueueError>;

pub fn subject_for(job: &NotificationJob) -> String { format!("{SUBJECT_PREFIX}.{}", job.kind()) }

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Returns once the queue has durably accepted the job.
    async fn enqueue(&self, job: &NotificationJob) -> Result<()>;
}
