//! JetStream-backed queue

use async_nats::jetstream::{self, stream::{RetentionPolicy, StorageType}, Context};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{subject_for, NotificationQueue, QueueError, Result, SUBJECT_PREFIX};
use crate::domain::events::NotificationJob;

#[derive(Clone)]
pub struct JetStreamQueue { context: Context, stream: String }

impl JetStreamQueue {
    /// Connects and makes sure the work-queue stream exists.
    pub async fn connect(url: &str, stream: &str) -> Result<Self> {
        let client = async_nats::connect(url).await.map_err(|e| QueueError::Nats(e.to_string()))?;
        let queue = Self { context: jetstream::new(client), stream: stream.to_string() };
        queue.ensure_stream().await?;
        info!(stream, url, "connected to notification queue");
        Ok(queue)
    }

    pub async fn ensure_stream(&self) -> Result<jetstream::stream::Stream> {
        self.context
            .get_or_create_stream(jetstream::stream::Config {
                name: self.stream.clone(),
                subjects: vec![format!("{SUBJECT_PREFIX}.>")],
                retention: RetentionPolicy::WorkQueue,
                storage: StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| QueueError::Nats(e.to_string()))
    }
}

#[async_trait]
impl NotificationQueue for JetStreamQueue {
    async fn enqueue(&self, job: &NotificationJob) -> Result<()> {
        let payload = serde_json::to_vec(job)?;
        let ack = self.context.publish(subject_for(job), payload.into()).await.map_err(|e| QueueError::Nats(e.to_string()))?;
        let ack = ack.await.map_err(|e| QueueError::Nats(e.to_string()))?;
        debug!(kind = job.kind(), sequence = ack.sequence, "notification enqueued");
        Ok(())
    }
}
