use std::collections::HashMap;

use chrono::Utc;
use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::document::Document;
use common::storage::types::ingestion_job::{IngestionJob, IngestionMethod, IngestionStatus};
use common::storage::types::processing_job::{ProcessingJob, ProcessingStatus};
use common::storage::types::processing_queue::{ProcessingQueueEntry, QueuePriority};
use common::storage::types::StoredObject;
use tracing::{info, warn};

const MIN_WORKERS: u32 = 1;
const MAX_WORKERS: u32 = 10;
const MAX_RETRY_ATTEMPTS: u32 = 5;
const DOCS_PER_SECOND_THROUGHPUT: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum StartBatchError {
    #[error("parallel_workers must be between {MIN_WORKERS} and {MAX_WORKERS}, got {0}")]
    InvalidWorkerCount(u32),
    #[error("retry_attempts must be between 0 and {MAX_RETRY_ATTEMPTS}, got {0}")]
    InvalidRetryAttempts(u32),
    #[error(transparent)]
    App(#[from] AppError),
}

/// Creates one `ProcessingJob` (Queued) and one queue entry (Normal
/// priority) per document, distributing them round-robin across
/// `parallel_workers` logical workers.
pub async fn start_batch(
    db: &SurrealDbClient,
    ingestion_job: &IngestionJob,
    doc_ids: &[String],
    chrome_stripper_version: &str,
    parallel_workers: u32,
    retry_attempts: u32,
) -> Result<Vec<ProcessingJob>, StartBatchError> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&parallel_workers) {
        return Err(StartBatchError::InvalidWorkerCount(parallel_workers));
    }
    if retry_attempts > MAX_RETRY_ATTEMPTS {
        return Err(StartBatchError::InvalidRetryAttempts(retry_attempts));
    }

    let mut jobs = Vec::with_capacity(doc_ids.len());
    for doc_id in doc_ids {
        let job = ProcessingJob::new(ingestion_job.id.clone(), doc_id.clone(), chrome_stripper_version.to_string(), None);
        let stored = db.store_item(job.clone()).await.map_err(AppError::from)?;
        let job = stored.unwrap_or(job);

        let entry = ProcessingQueueEntry::new(job.id.clone(), QueuePriority::Normal);
        db.store_item(entry).await.map_err(AppError::from)?;

        jobs.push(job);
    }

    info!(
        ingestion_job_id = %ingestion_job.id,
        doc_count = doc_ids.len(),
        parallel_workers,
        retry_attempts,
        "batch started"
    );

    Ok(jobs)
}

#[derive(Debug, Default)]
pub struct BatchStatusSnapshot {
    pub counts_by_status: HashMap<String, u32>,
    pub active_worker_ids: Vec<String>,
    pub progress_percentage: f64,
    pub eta_seconds: i64,
}

/// Aggregates a live snapshot of a batch's processing jobs.
pub async fn status(db: &SurrealDbClient, ingestion_job_id: &str) -> Result<BatchStatusSnapshot, AppError> {
    let jobs = processing_jobs_for(db, ingestion_job_id).await?;
    let now = Utc::now();

    let mut counts_by_status = HashMap::new();
    let mut active_worker_ids = Vec::new();
    let mut eta_sum = 0i64;
    let mut eta_samples = 0u32;
    let mut completed = 0u32;

    for job in &jobs {
        let key = format!("{:?}", job.status).to_lowercase();
        *counts_by_status.entry(key).or_insert(0) += 1;

        if job.status == ProcessingStatus::Processing {
            if let Some(worker_id) = &job.worker_id {
                if !active_worker_ids.contains(worker_id) {
                    active_worker_ids.push(worker_id.clone());
                }
            }
            let eta = job.eta_seconds(now);
            if eta > 0 {
                eta_sum += eta;
                eta_samples += 1;
            }
        }
        if job.status == ProcessingStatus::Completed {
            completed += 1;
        }
    }

    let total = jobs.len() as f64;
    let progress_percentage = if total > 0.0 { completed as f64 / total * 100.0 } else { 0.0 };

    let pending_count = jobs
        .iter()
        .filter(|j| matches!(j.status, ProcessingStatus::Queued | ProcessingStatus::Processing))
        .count() as f64;
    let average_eta = if eta_samples > 0 { eta_sum as f64 / f64::from(eta_samples) } else { 0.0 };
    let eta_seconds = (average_eta * pending_count) as i64;

    Ok(BatchStatusSnapshot {
        counts_by_status,
        active_worker_ids,
        progress_percentage,
        eta_seconds,
    })
}

/// Flips selected Failed jobs back to Queued with High priority.
pub async fn retry_failed(db: &SurrealDbClient, ingestion_job_id: &str, job_ids: Option<&[String]>) -> Result<u32, AppError> {
    let jobs = processing_jobs_for(db, ingestion_job_id).await?;
    let mut retried = 0;

    for mut job in jobs {
        if job.status != ProcessingStatus::Failed {
            continue;
        }
        if let Some(ids) = job_ids {
            if !ids.contains(&job.id) {
                continue;
            }
        }

        job.transition_to(ProcessingStatus::Queued)?;
        job.retry_count = job.retry_count.saturating_add(1);
        job.error_message = None;
        db.store_item(job.clone()).await.map_err(AppError::from)?;

        let mut entry = ProcessingQueueEntry::new(job.id.clone(), QueuePriority::High);
        entry.priority = QueuePriority::High;
        db.store_item(entry).await.map_err(AppError::from)?;
        retried += 1;
    }

    Ok(retried)
}

/// Resets every Processing job owned by a crashed worker back to Queued
/// with High priority so another worker can pick it up.
pub async fn handle_worker_failure(db: &SurrealDbClient, worker_id: &str) -> Result<u32, AppError> {
    let all_jobs: Vec<ProcessingJob> = db.get_all_stored_items().await.map_err(AppError::from)?;
    let mut recovered = 0;

    for mut job in all_jobs {
        if job.status != ProcessingStatus::Processing || job.worker_id.as_deref() != Some(worker_id) {
            continue;
        }

        job.worker_id = None;
        job.progress = 0.0;
        job.transition_to(ProcessingStatus::Queued)?;
        db.store_item(job.clone()).await.map_err(AppError::from)?;

        let mut entry = ProcessingQueueEntry::new(job.id.clone(), QueuePriority::High);
        entry.priority = QueuePriority::High;
        db.store_item(entry).await.map_err(AppError::from)?;

        recovered += 1;
        warn!(worker_id, job_id = %job.id, "recovered job from failed worker");
    }

    Ok(recovered)
}

/// Pauses an ingestion job. Jobs currently Processing run to completion;
/// nothing new starts.
pub async fn pause(db: &SurrealDbClient, ingestion_job: &mut IngestionJob) -> Result<(), AppError> {
    ingestion_job.transition_to(IngestionStatus::Paused)?;
    db.store_item(ingestion_job.clone()).await.map_err(AppError::from)?;
    Ok(())
}

/// Cancels an ingestion job. Queued processing jobs fail immediately;
/// in-flight jobs finish naturally.
pub async fn cancel(db: &SurrealDbClient, ingestion_job: &mut IngestionJob) -> Result<(), AppError> {
    ingestion_job.transition_to(IngestionStatus::Cancelled)?;
    db.store_item(ingestion_job.clone()).await.map_err(AppError::from)?;

    let jobs = processing_jobs_for(db, &ingestion_job.id).await?;
    for mut job in jobs {
        if job.status == ProcessingStatus::Queued {
            job.transition_to(ProcessingStatus::Failed)?;
            job.error_message = Some("Cancelled by user".to_string());
            db.store_item(job).await.map_err(AppError::from)?;
        }
    }

    Ok(())
}

#[derive(Debug)]
pub struct ReprocessOutcome {
    pub batch_id: String,
    pub queued_count: u32,
    pub estimated_duration_seconds: u64,
    pub status_url: String,
}

/// Mints a reprocessing batch over every document that never succeeded
/// and still has content, rejecting if another batch is already in
/// flight.
pub async fn reprocess_failed_documents(db: &SurrealDbClient, chrome_stripper_version: &str) -> Result<ReprocessOutcome, AppError> {
    let existing_jobs: Vec<ProcessingJob> = db.get_all_stored_items().await.map_err(AppError::from)?;
    let has_active_batch = existing_jobs
        .iter()
        .any(|job| job.reprocessing_batch_id.is_some() && matches!(job.status, ProcessingStatus::Queued | ProcessingStatus::Processing));
    if has_active_batch {
        return Err(AppError::Conflict("a reprocessing batch is already in progress".to_string()));
    }

    let documents: Vec<Document> = db.get_all_stored_items().await.map_err(AppError::from)?;
    let eligible: Vec<&Document> = documents.iter().filter(|doc| doc.needs_reprocessing()).collect();

    if eligible.is_empty() {
        return Err(AppError::NotFound("no documents eligible for reprocessing".to_string()));
    }

    let batch_id = format!("reprocess-{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
    let parent = IngestionJob::new("system".to_string(), IngestionMethod::Upload, batch_id.clone());
    db.store_item(parent.clone()).await.map_err(AppError::from)?;

    for document in &eligible {
        let mut job = ProcessingJob::new(parent.id.clone(), document.id.clone(), chrome_stripper_version.to_string(), Some(batch_id.clone()));
        job.reprocessing_batch_id = Some(batch_id.clone());
        db.store_item(job.clone()).await.map_err(AppError::from)?;
        db.store_item(ProcessingQueueEntry::new(job.id.clone(), QueuePriority::Normal))
            .await
            .map_err(AppError::from)?;
    }

    let queued_count = eligible.len() as u32;
    let estimated_duration_seconds = (f64::from(queued_count) / DOCS_PER_SECOND_THROUGHPUT) as u64;

    Ok(ReprocessOutcome {
        batch_id: batch_id.clone(),
        queued_count,
        estimated_duration_seconds,
        status_url: format!("/reprocessing-status/{batch_id}"),
    })
}

#[derive(Debug)]
pub struct BatchStatusView {
    pub queued: u32,
    pub processing: u32,
    pub completed: u32,
    pub failed: u32,
    pub success_rate: f64,
    pub overall_status: &'static str,
    pub estimated_time_remaining_seconds: u64,
    pub started_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

pub async fn batch_status(db: &SurrealDbClient, batch_id: &str) -> Result<BatchStatusView, AppError> {
    let all_jobs: Vec<ProcessingJob> = db.get_all_stored_items().await.map_err(AppError::from)?;
    let jobs: Vec<&ProcessingJob> = all_jobs.iter().filter(|j| j.reprocessing_batch_id.as_deref() == Some(batch_id)).collect();

    if jobs.is_empty() {
        return Err(AppError::NotFound(format!("no batch found for id {batch_id}")));
    }

    let queued = jobs.iter().filter(|j| j.status == ProcessingStatus::Queued).count() as u32;
    let processing = jobs.iter().filter(|j| j.status == ProcessingStatus::Processing).count() as u32;
    let completed = jobs.iter().filter(|j| j.status == ProcessingStatus::Completed).count() as u32;
    let failed = jobs.iter().filter(|j| j.status == ProcessingStatus::Failed).count() as u32;
    let total = jobs.len() as u32;

    let finished = completed + failed;
    let success_rate = if finished > 0 { f64::from(completed) / f64::from(finished) * 100.0 } else { 0.0 };

    let overall_status = if processing > 0 || queued > 0 {
        "in_progress"
    } else if completed == total && failed == 0 {
        "completed"
    } else if failed == total && completed == 0 {
        "failed"
    } else {
        "queued"
    };

    let estimated_time_remaining_seconds = (f64::from(queued + processing) / DOCS_PER_SECOND_THROUGHPUT) as u64;
    let started_at = jobs.iter().map(|j| j.created_at).min().unwrap_or_else(Utc::now);
    let updated_at = jobs.iter().map(|j| j.updated_at).max().unwrap_or_else(Utc::now);

    Ok(BatchStatusView {
        queued,
        processing,
        completed,
        failed,
        success_rate,
        overall_status,
        estimated_time_remaining_seconds,
        started_at,
        updated_at,
    })
}

/// The batch_id of the current non-terminal reprocessing batch, if any.
/// Callers use this to populate a 409 response's `active_batch_id`.
pub async fn active_reprocessing_batch_id(db: &SurrealDbClient) -> Result<Option<String>, AppError> {
    let all_jobs: Vec<ProcessingJob> = db.get_all_stored_items().await.map_err(AppError::from)?;
    Ok(all_jobs
        .into_iter()
        .find(|job| job.reprocessing_batch_id.is_some() && matches!(job.status, ProcessingStatus::Queued | ProcessingStatus::Processing))
        .and_then(|job| job.reprocessing_batch_id))
}

async fn processing_jobs_for(db: &SurrealDbClient, ingestion_job_id: &str) -> Result<Vec<ProcessingJob>, AppError> {
    let all: Vec<ProcessingJob> = db.get_all_stored_items().await.map_err(AppError::from)?;
    Ok(all.into_iter().filter(|job| job.ingestion_job_id == ingestion_job_id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string()).await.expect("memory db");
        db.ensure_initialized().await.expect("init schema");
        db
    }

    #[tokio::test]
    async fn start_batch_rejects_out_of_range_worker_count() {
        let db = memory_db().await;
        let job = IngestionJob::new("u1".into(), IngestionMethod::Upload, "{}".into());
        let err = start_batch(&db, &job, &["doc1".into()], "1.0.0", 0, 1).await.unwrap_err();
        assert!(matches!(err, StartBatchError::InvalidWorkerCount(0)));
    }

    #[tokio::test]
    async fn start_batch_rejects_out_of_range_retry_attempts() {
        let db = memory_db().await;
        let job = IngestionJob::new("u1".into(), IngestionMethod::Upload, "{}".into());
        let err = start_batch(&db, &job, &["doc1".into()], "1.0.0", 2, 6).await.unwrap_err();
        assert!(matches!(err, StartBatchError::InvalidRetryAttempts(6)));
    }

    #[tokio::test]
    async fn start_batch_creates_one_job_per_document() {
        let db = memory_db().await;
        let job = IngestionJob::new("u1".into(), IngestionMethod::Upload, "{}".into());
        let jobs = start_batch(&db, &job, &["doc1".into(), "doc2".into()], "1.0.0", 2, 3).await.expect("valid batch");
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.status == ProcessingStatus::Queued));
    }

    #[tokio::test]
    async fn cancel_fails_queued_jobs_with_reason() {
        let db = memory_db().await;
        let mut ingestion_job = IngestionJob::new("u1".into(), IngestionMethod::Upload, "{}".into());
        ingestion_job.transition_to(IngestionStatus::InProgress).expect("pending to in-progress");
        db.store_item(ingestion_job.clone()).await.expect("store");
        start_batch(&db, &ingestion_job, &["doc1".into()], "1.0.0", 1, 0).await.expect("valid batch");

        cancel(&db, &mut ingestion_job).await.expect("cancel");

        let jobs = processing_jobs_for(&db, &ingestion_job.id).await.expect("jobs");
        assert_eq!(jobs[0].status, ProcessingStatus::Failed);
        assert_eq!(jobs[0].error_message.as_deref(), Some("Cancelled by user"));
    }
}
