//! OpenSASE Checkout mail worker - delivers queued notification emails

use anyhow::{Context, Result};
use opensase_checkout::{mailer::HttpMailer, queue::{worker, JetStreamQueue}, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = WorkerConfig::from_env()?;

    let queue = JetStreamQueue::connect(&config.nats_url, &config.mail_stream).await.context("connecting to NATS")?;
    let stream = queue.ensure_stream().await?;
    let mailer = HttpMailer::new(&config.mail_relay_url)?;

    tracing::info!("📬 mail worker started on stream {}", config.mail_stream);
    worker::run(stream, &mailer, &config.mail_from).await?;
    tracing::warn!("notification stream closed, mail worker exiting");
    Ok(())
}
