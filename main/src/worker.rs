use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::Client as OpenAiClient;
use common::storage::db::SurrealDbClient;
use common::utils::config::get_config;
use ingestion_pipeline::chrome_stripper::CHROME_STRIPPER_VERSION;
use ingestion_pipeline::run_worker_loop;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_initialized().await?;

    let openai_client = Arc::new(OpenAiClient::with_config(
        OpenAIConfig::new().with_api_key(&config.openai_api_key).with_api_base(&config.openai_base_url),
    ));

    run_worker_loop(db, CHROME_STRIPPER_VERSION.to_string(), openai_client, config.embedding_model).await
}
