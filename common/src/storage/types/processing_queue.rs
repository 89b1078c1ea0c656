
use crate::stored_object;

/// Priority ordering for worker claim selection (component G): higher
/// priority drains first, ties broken by queue order (oldest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for QueuePriority {
    fn default() -> Self {
        Self::Normal
    }
}

stored_object!(ProcessingQueueEntry, "processing_queue", {
    processing_job_id: String,
    priority: QueuePriority,
    #[serde(serialize_with = "serialize_datetime", deserialize_with = "deserialize_datetime", default)]
    queued_at: DateTime<Utc>,
    worker_id: Option<String>,
    #[serde(serialize_with = "serialize_option_datetime", deserialize_with = "deserialize_option_datetime", default)]
    assigned_at: Option<DateTime<Utc>>
});

impl ProcessingQueueEntry {
    pub fn new(processing_job_id: String, priority: QueuePriority) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            processing_job_id,
            priority,
            queued_at: now,
            worker_id: None,
            assigned_at: None,
        }
    }

    pub fn assign_to(&mut self, worker_id: String) {
        self.worker_id = Some(worker_id);
        self.assigned_at = Some(chrono::Utc::now());
        self.updated_at = chrono::Utc::now();
    }

    /// True once a worker has claimed this entry but a lease has not yet
    /// expired (component G: workers hold a bounded lease while processing).
    pub fn is_leased(&self, now: chrono::DateTime<chrono::Utc>, lease_secs: i64) -> bool {
        match self.assigned_at {
            Some(assigned) => (now - assigned).num_seconds() < lease_secs,
            None => false,
        }
    }
}

/// Orders entries for worker claim selection: priority descending, then
/// queued_at ascending (oldest first within the same priority).
pub fn claim_order(a: &ProcessingQueueEntry, b: &ProcessingQueueEntry) -> std::cmp::Ordering {
    b.priority.cmp(&a.priority).then_with(|| a.queued_at.cmp(&b.queued_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_claims_first() {
        let mut entries = vec![
            ProcessingQueueEntry::new("pj1".into(), QueuePriority::Normal),
            ProcessingQueueEntry::new("pj2".into(), QueuePriority::Urgent),
            ProcessingQueueEntry::new("pj3".into(), QueuePriority::Low),
        ];
        entries.sort_by(claim_order);
        assert_eq!(entries[0].processing_job_id, "pj2");
        assert_eq!(entries[2].processing_job_id, "pj3");
    }

    #[test]
    fn same_priority_breaks_tie_by_queued_at() {
        let mut first = ProcessingQueueEntry::new("pj1".into(), QueuePriority::Normal);
        let mut second = ProcessingQueueEntry::new("pj2".into(), QueuePriority::Normal);
        second.queued_at = first.queued_at + chrono::Duration::seconds(5);
        let mut entries = vec![second.clone(), first.clone()];
        entries.sort_by(claim_order);
        assert_eq!(entries[0].processing_job_id, "pj1");
        let _ = (&mut first, &mut second);
    }

    #[test]
    fn lease_expires_after_bound() {
        let mut entry = ProcessingQueueEntry::new("pj1".into(), QueuePriority::Normal);
        entry.assign_to("w1".into());
        let later = entry.assigned_at.expect("assigned") + chrono::Duration::seconds(400);
        assert!(!entry.is_leased(later, 300));
    }
}
