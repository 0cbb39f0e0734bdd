use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{NotificationQueue, QueueError, Result};
use crate::domain::events::NotificationJob;

/// Collects jobs in memory; used by tests and local runs without NATS.
#[derive(Default)]
pub struct MemoryQueue { jobs: Mutex<Vec<NotificationJob>>, unavailable: AtomicBool }

impl MemoryQueue {
    pub fn new() -> Self { Self::default() }
    pub fn set_unavailable(&self, unavailable: bool) { self.unavailable.store(unavailable, Ordering::SeqCst); }
    pub async fn jobs(&self) -> Vec<NotificationJob> { self.jobs.lock().await.clone() }
}

#[async_trait]
impl NotificationQueue for MemoryQueue {
    async fn enqueue(&self, job: &NotificationJob) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) { return Err(QueueError::Unavailable); }
        self.jobs.lock().await.push(job.clone());
        Ok(())
    }
}
