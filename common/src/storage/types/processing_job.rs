
use crate::stored_object;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Queued -> {Processing, Failed}; Processing -> {Completed, Failed};
    /// Completed is terminal; Failed -> Queued (retry).
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::{Completed, Failed, Processing, Queued};
        matches!(
            (self, next),
            (Queued, Processing) | (Queued, Failed) | (Processing, Completed) | (Processing, Failed) | (Failed, Queued)
        )
    }
}

stored_object!(ProcessingJob, "processing_job", {
    ingestion_job_id: String,
    document_id: String,
    worker_id: Option<String>,
    status: ProcessingStatus,
    progress: f32,
    retry_count: u32,
    reprocessing_batch_id: Option<String>,
    chrome_stripper_version: String,
    #[serde(serialize_with = "serialize_option_datetime", deserialize_with = "deserialize_option_datetime", default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_option_datetime", deserialize_with = "deserialize_option_datetime", default)]
    end_time: Option<DateTime<Utc>>,
    error_message: Option<String>
});

impl ProcessingJob {
    pub fn new(
        ingestion_job_id: String,
        document_id: String,
        chrome_stripper_version: String,
        reprocessing_batch_id: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            ingestion_job_id,
            document_id,
            worker_id: None,
            status: ProcessingStatus::Queued,
            progress: 0.0,
            retry_count: 0,
            reprocessing_batch_id,
            chrome_stripper_version,
            start_time: None,
            end_time: None,
            error_message: None,
        }
    }

    pub fn transition_to(&mut self, next: ProcessingStatus) -> Result<(), crate::error::AppError> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::AppError::Validation(format!(
                "invalid processing job transition {:?} -> {next:?}",
                self.status
            )));
        }
        self.status = next;
        self.updated_at = chrono::Utc::now();
        match next {
            ProcessingStatus::Processing if self.start_time.is_none() => {
                self.start_time = Some(self.updated_at);
            }
            ProcessingStatus::Completed | ProcessingStatus::Failed => {
                self.end_time = Some(self.updated_at);
            }
            ProcessingStatus::Queued => {
                self.worker_id = None;
                self.progress = 0.0;
            }
            _ => {}
        }
        Ok(())
    }

    /// Per-job ETA: `elapsed * (100 - progress) / progress`, matching the
    /// original model's `eta_seconds` property. Zero unless actively
    /// processing with nonzero measured progress.
    pub fn eta_seconds(&self, now: chrono::DateTime<chrono::Utc>) -> i64 {
        if self.status != ProcessingStatus::Processing || self.progress <= 0.0 {
            return 0;
        }
        let Some(start) = self.start_time else {
            return 0;
        };
        let elapsed = (now - start).num_seconds();
        if elapsed <= 0 {
            return 0;
        }
        let rate = f64::from(self.progress) / elapsed as f64;
        if rate <= 0.0 {
            return 0;
        }
        let remaining = 100.0 - f64::from(self.progress);
        (remaining / rate) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn failed_can_retry_to_queued() {
        let mut job = ProcessingJob::new("ij".into(), "doc".into(), "1.0.0".into(), None);
        job.transition_to(ProcessingStatus::Processing).expect("queued to processing");
        job.transition_to(ProcessingStatus::Failed).expect("processing to failed");
        assert!(job.transition_to(ProcessingStatus::Queued).is_ok());
    }

    #[test]
    fn completed_is_terminal() {
        let mut job = ProcessingJob::new("ij".into(), "doc".into(), "1.0.0".into(), None);
        job.transition_to(ProcessingStatus::Processing).expect("queued to processing");
        job.transition_to(ProcessingStatus::Completed).expect("processing to completed");
        assert!(job.transition_to(ProcessingStatus::Queued).is_err());
    }

    #[test]
    fn eta_is_zero_when_not_processing() {
        let job = ProcessingJob::new("ij".into(), "doc".into(), "1.0.0".into(), None);
        assert_eq!(job.eta_seconds(chrono::Utc::now()), 0);
    }

    #[test]
    fn eta_extrapolates_from_elapsed_and_progress() {
        let mut job = ProcessingJob::new("ij".into(), "doc".into(), "1.0.0".into(), None);
        job.transition_to(ProcessingStatus::Processing).expect("queued to processing");
        job.progress = 25.0;
        let now = job.start_time.expect("start time set") + Duration::seconds(10);
        // elapsed=10, rate=2.5/s, remaining=75 -> eta=30
        assert_eq!(job.eta_seconds(now), 30);
    }
}
