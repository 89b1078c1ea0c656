//! Batch control plane (component G): starts, monitors and recovers
//! ingestion batches, and runs the worker loop that drains the processing
//! queue.

mod control;
mod worker;

pub use control::{
    batch_status, cancel, handle_worker_failure, pause, reprocess_failed_documents, retry_failed, start_batch, status,
    BatchStatusSnapshot, BatchStatusView, ReprocessOutcome, StartBatchError,
};
pub use worker::run_worker_loop;
