//! Mail worker: drains the notification stream and delivers each job by email.

use std::time::Duration;

use async_nats::jetstream::{self, consumer::{pull, AckPolicy}, AckKind};
use futures::StreamExt;
use tracing::{error, info, warn};

use super::{QueueError, Result};
use crate::domain::events::NotificationJob;
use crate::mailer::{render, Mailer};

pub const DURABLE_CONSUMER: &str = "mail-worker";
pub const RETRY_DELAY: Duration = Duration::from_secs(30);
pub const MAX_DELIVER: i64 = 10;

/// What to tell the queue about one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    /// Redeliver after [`RETRY_DELAY`].
    Retry,
    /// Never redeliver.
    Drop,
}

pub async fn handle_job(payload: &[u8], mailer: &dyn Mailer, from: &str) -> Outcome {
    let job: NotificationJob = match serde_json::from_slice(payload) {
        Ok(job) => job,
        Err(e) => { error!(error = %e, "undecodable notification job dropped"); return Outcome::Drop; }
    };
    let email = render(&job, from);
    match mailer.send(&email).await {
        Ok(()) => { info!(kind = job.kind(), to = %email.to, "notification delivered"); Outcome::Ack }
        Err(e) => { warn!(kind = job.kind(), to = %email.to, error = %e, "notification delivery failed, will retry"); Outcome::Retry }
    }
}

/// Consumes the stream until it closes.
pub async fn run(stream: jetstream::stream::Stream, mailer: &dyn Mailer, from: &str) -> Result<()> {
    let consumer = stream
        .get_or_create_consumer(DURABLE_CONSUMER, pull::Config {
            durable_name: Some(DURABLE_CONSUMER.to_string()),
            ack_policy: AckPolicy::Explicit,
            max_deliver: MAX_DELIVER,
            ..Default::default()
        })
        .await
        .map_err(|e| QueueError::Nats(e.to_string()))?;
    let mut messages = consumer.messages().await.map_err(|e| QueueError::Nats(e.to_string()))?;
    info!(consumer = DURABLE_CONSUMER, "mail worker consuming");

    while let Some(message) = messages.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => { warn!(error = %e, "cannot receive message"); continue; }
        };
        let ack = match handle_job(&message.payload, mailer, from).await {
            Outcome::Ack => message.ack().await,
            Outcome::Retry => message.ack_with(AckKind::Nak(Some(RETRY_DELAY))).await,
            Outcome::Drop => message.ack_with(AckKind::Term).await,
        };
        if let Err(e) = ack { warn!(error = %e, subject = %message.subject, "cannot acknowledge message"); }
    }
    Ok(())
}
