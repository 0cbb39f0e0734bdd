//! OpenSASE Checkout - order creation and fulfilment service

use std::sync::Arc;

use anyhow::{Context, Result};
use opensase_checkout::{
    queue::JetStreamQueue, router, search::ElasticsearchIndex, store::PgRecordStore, AppState, Config, Repositories,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await.context("connecting to Postgres")?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let index = ElasticsearchIndex::new(&config.search_url)?;
    let queue = JetStreamQueue::connect(&config.nats_url, &config.mail_stream).await.context("connecting to NATS")?;
    let repos = Repositories::new(Arc::new(PgRecordStore::new(db)), Arc::new(index), config.mirror_retries);

    repos.prepare_indices().await.context("preparing search indices")?;
    if config.reindex_on_start {
        let documents = repos.reindex().await.context("rebuilding search index")?;
        tracing::info!(documents, "search index rebuilt");
    }

    let app = router(AppState::new(repos, Arc::new(queue), &config.jwt_secret));
    tracing::info!("🚀 OpenSASE Checkout listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
