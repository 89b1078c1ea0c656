
use crate::stored_object;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionMethod {
    Url,
    Upload,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Paused,
    Cancelled,
}

impl IngestionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IngestionStatus::Completed | IngestionStatus::Failed | IngestionStatus::Cancelled
        )
    }

    /// FSM edges from §3: Pending -> InProgress -> {Completed, Failed,
    /// Paused, Cancelled}; Paused <-> InProgress.
    pub fn can_transition_to(self, next: IngestionStatus) -> bool {
        use IngestionStatus::{Cancelled, Completed, Failed, InProgress, Paused, Pending};
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Paused)
                | (InProgress, Cancelled)
                | (Paused, InProgress)
                | (Paused, Cancelled)
        )
    }
}

stored_object!(IngestionJob, "ingestion_job", {
    user_id: String,
    method: IngestionMethod,
    status: IngestionStatus,
    source_details: String,
    total_documents: u32,
    processed_documents: u32,
    failed_documents: u32,
    #[serde(serialize_with = "serialize_option_datetime", deserialize_with = "deserialize_option_datetime", default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_option_datetime", deserialize_with = "deserialize_option_datetime", default)]
    finished_at: Option<DateTime<Utc>>
});

impl IngestionJob {
    pub fn new(user_id: String, method: IngestionMethod, source_details: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            user_id,
            method,
            status: IngestionStatus::Pending,
            source_details,
            total_documents: 0,
            processed_documents: 0,
            failed_documents: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Attempt a status transition, rejecting invalid edges instead of
    /// silently mutating (§9: invalid state transition policy).
    pub fn transition_to(&mut self, next: IngestionStatus) -> Result<(), crate::error::AppError> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::AppError::Validation(format!(
                "invalid ingestion job transition {:?} -> {next:?}",
                self.status
            )));
        }
        self.status = next;
        self.updated_at = chrono::Utc::now();
        if next.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
        Ok(())
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.total_documents == 0 {
            return 0.0;
        }
        f64::from(self.processed_documents) / f64::from(self.total_documents) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_transition() {
        let mut job = IngestionJob::new("u1".into(), IngestionMethod::Url, "{}".into());
        assert!(job.transition_to(IngestionStatus::Completed).is_err());
        assert_eq!(job.status, IngestionStatus::Pending);
    }

    #[test]
    fn paused_can_resume_or_cancel() {
        let mut job = IngestionJob::new("u1".into(), IngestionMethod::Url, "{}".into());
        job.transition_to(IngestionStatus::InProgress).expect("pending to in-progress");
        job.transition_to(IngestionStatus::Paused).expect("in-progress to paused");
        assert!(job.transition_to(IngestionStatus::InProgress).is_ok());
    }

    #[test]
    fn terminal_states_set_finished_at() {
        let mut job = IngestionJob::new("u1".into(), IngestionMethod::Url, "{}".into());
        job.transition_to(IngestionStatus::InProgress).expect("pending to in-progress");
        job.transition_to(IngestionStatus::Cancelled).expect("in-progress to cancelled");
        assert!(job.finished_at.is_some());
        assert!(job.status.is_terminal());
    }
}
