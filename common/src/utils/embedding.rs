//! Dense embedding generation for queries and chunks, backed by an OpenAI-
//! compatible embeddings endpoint. Retried with exponential backoff since
//! rate-limit errors are the dominant transient failure mode here.

use async_openai::types::CreateEmbeddingRequestArgs;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};

use crate::error::AppError;

/// Generate a single embedding, retrying up to 3 times on transient errors
/// with jittered exponential backoff starting at 100ms.
pub async fn generate_embedding(
    client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    model: &str,
    input: &str,
) -> Result<Vec<f32>, AppError> {
    let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);

    Retry::spawn(retry_strategy, || generate_embedding_once(client, model, input)).await
}

async fn generate_embedding_once(
    client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    model: &str,
    input: &str,
) -> Result<Vec<f32>, AppError> {
    let request = CreateEmbeddingRequestArgs::default()
        .model(model)
        .input([input])
        .build()
        .map_err(AppError::from)?;

    let response = client.embeddings().create(request).await.map_err(AppError::from)?;

    response
        .data
        .into_iter()
        .next()
        .map(|datum| datum.embedding)
        .ok_or_else(|| AppError::InternalError("no embedding data received".into()))
}
