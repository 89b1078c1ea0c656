use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::Client as OpenAiClient;
use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::chunk::Chunk;
use common::storage::types::document::Document;
use common::storage::types::processing_job::ProcessingStatus;
use common::storage::types::processing_queue::{claim_order, ProcessingQueueEntry};
use common::storage::types::StoredObject;
use common::storage::vector_store;
use common::utils::embedding::generate_embedding;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunker;

const DEFAULT_LEASE_SECS: i64 = 300;
const DEFAULT_IDLE_BACKOFF_MS: u64 = 500;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Pulls entries from the processing queue in priority order and drives
/// each document through chrome-stripping, chunking, embedding and
/// persistence. Mirrors the claim-loop/idle-backoff shape used by the rest
/// of the worker fleet, with a bounded lease so a crashed worker's claim
/// expires instead of stranding the document.
pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    chrome_stripper_version: String,
    openai_client: Arc<OpenAiClient<OpenAIConfig>>,
    embedding_model: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let worker_id = format!("ingestion-worker-{}", Uuid::new_v4());
    let idle_backoff = Duration::from_millis(DEFAULT_IDLE_BACKOFF_MS);

    loop {
        match claim_next_ready(&db, &worker_id).await {
            Ok(Some(entry)) => {
                info!(%worker_id, processing_job_id = %entry.processing_job_id, "claimed processing queue entry");
                if let Err(err) = process_entry(&db, &worker_id, &entry, &chrome_stripper_version, &openai_client, &embedding_model).await {
                    error!(%worker_id, processing_job_id = %entry.processing_job_id, error = %err, "processing job failed");
                }
            }
            Ok(None) => sleep(idle_backoff).await,
            Err(err) => {
                error!(%worker_id, error = %err, "failed to claim processing queue entry");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Finds the highest-priority, unleased queue entry and marks it assigned
/// to `worker_id`. Entries whose lease has expired (worker crashed
/// mid-task) are eligible again.
async fn claim_next_ready(db: &SurrealDbClient, worker_id: &str) -> Result<Option<ProcessingQueueEntry>, AppError> {
    let mut entries: Vec<ProcessingQueueEntry> = db.get_all_stored_items().await.map_err(AppError::from)?;
    entries.sort_by(claim_order);

    let now = chrono::Utc::now();
    for mut entry in entries {
        if entry.is_leased(now, DEFAULT_LEASE_SECS) {
            continue;
        }
        entry.assign_to(worker_id.to_string());
        db.store_item(entry.clone()).await.map_err(AppError::from)?;
        return Ok(Some(entry));
    }
    Ok(None)
}

#[allow(clippy::too_many_arguments)]
async fn process_entry(
    db: &SurrealDbClient,
    worker_id: &str,
    entry: &ProcessingQueueEntry,
    chrome_stripper_version: &str,
    openai_client: &OpenAiClient<OpenAIConfig>,
    embedding_model: &str,
) -> Result<(), AppError> {
    let mut job = db
        .get_item(&entry.processing_job_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("processing job {} not found", entry.processing_job_id)))?;

    job.worker_id = Some(worker_id.to_string());
    job.chrome_stripper_version = chrome_stripper_version.to_string();
    job.transition_to(ProcessingStatus::Processing)?;
    db.store_item(job.clone()).await.map_err(AppError::from)?;

    let mut document: Document = db
        .get_item(&job.document_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("document {} not found", job.document_id)))?;

    let outcome = process_document_with_retries(db, &mut document, DEFAULT_RETRY_MAX_ATTEMPTS, openai_client, embedding_model).await;

    match outcome {
        Ok(chunk_count) => {
            document.processing_success = Some(true);
            document.processing_error = None;
            document.reprocessed_at = Some(chrono::Utc::now());
            db.store_item(document).await.map_err(AppError::from)?;

            job.progress = 100.0;
            job.transition_to(ProcessingStatus::Completed)?;
            db.store_item(job).await.map_err(AppError::from)?;
            info!(%worker_id, document_id = %entry.processing_job_id, chunk_count, "document processed");
        }
        Err(err) => {
            document.processing_success = Some(false);
            document.processing_error = Some(truncate_message(&err.to_string()));
            db.store_item(document).await.map_err(AppError::from)?;

            job.error_message = Some(truncate_message(&err.to_string()));
            job.transition_to(ProcessingStatus::Failed)?;
            db.store_item(job).await.map_err(AppError::from)?;
            warn!(%worker_id, error = %err, "document processing exhausted retries");
        }
    }

    Ok(())
}

/// Strips chrome, chunks the document text, embeds each chunk and upserts
/// the resulting vector records, retrying transient failures with
/// exponential backoff.
async fn process_document_with_retries(
    db: &SurrealDbClient,
    document: &mut Document,
    max_attempts: u32,
    openai_client: &OpenAiClient<OpenAIConfig>,
    embedding_model: &str,
) -> Result<usize, AppError> {
    let mut backoff_ms = 200u64;
    let mut last_err = None;

    for attempt in 0..=max_attempts {
        match process_document(db, document, openai_client, embedding_model).await {
            Ok(chunk_count) => return Ok(chunk_count),
            Err(err) => {
                last_err = Some(err);
                if attempt < max_attempts {
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AppError::Processing("document processing failed with no recorded error".to_string())))
}

async fn process_document(
    db: &SurrealDbClient,
    document: &mut Document,
    openai_client: &OpenAiClient<OpenAIConfig>,
    embedding_model: &str,
) -> Result<usize, AppError> {
    let (cleaned, stats) = crate::chrome_stripper::strip_chrome(&document.raw_content, &document.id);
    document.chrome_removed = true;
    document.chrome_removal_stats = Some(stats);

    let text_chunks = chunker::chunk_text(&cleaned, 512);

    let mut chunks = Vec::with_capacity(text_chunks.len());
    for (index, text_chunk) in text_chunks.iter().enumerate() {
        let embedding = generate_embedding(openai_client, embedding_model, &text_chunk.text).await?;
        chunks.push(Chunk::new(
            document.id.clone(),
            document.id.clone(),
            document.canonical_url.clone(),
            index as u32,
            text_chunk.text.clone(),
            text_chunk.start,
            text_chunk.end,
            embedding,
        ));
    }

    let chunk_count = chunks.len();
    vector_store::upsert_batch(db, chunks).await?;
    Ok(chunk_count)
}

fn truncate_message(message: &str) -> String {
    const MAX_LEN: usize = 500;
    if message.len() <= MAX_LEN {
        message.to_string()
    } else {
        format!("{}...", &message[..MAX_LEN])
    }
}
