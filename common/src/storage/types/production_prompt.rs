use crate::stored_object;

/// Singleton row holding the currently live prompt (component K). Always
/// addressed by the fixed id `"production"` rather than a generated uuid.
pub const PRODUCTION_PROMPT_ID: &str = "production";

stored_object!(ProductionPrompt, "production_prompt", {
    prompt_text: String,
    promoted_version_name: String,
    promoter_id: String,
    previous_backup_path: Option<String>,
    optimistic_lock_counter: u64
});

impl ProductionPrompt {
    pub fn new(prompt_text: String, promoted_version_name: String, promoter_id: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: PRODUCTION_PROMPT_ID.to_string(),
            created_at: now,
            updated_at: now,
            prompt_text,
            promoted_version_name,
            promoter_id,
            previous_backup_path: None,
            optimistic_lock_counter: 0,
        }
    }

    /// Applies a promotion, bumping the optimistic lock counter so a
    /// concurrent writer working off a stale read can be detected and
    /// rejected (§4.K, §7 Conflict handling).
    pub fn promote(&mut self, prompt_text: String, promoted_version_name: String, promoter_id: String, backup_path: String) {
        self.prompt_text = prompt_text;
        self.promoted_version_name = promoted_version_name;
        self.promoter_id = promoter_id;
        self.previous_backup_path = Some(backup_path);
        self.optimistic_lock_counter += 1;
        self.updated_at = chrono::Utc::now();
    }

    /// Returns true if `expected_counter` no longer matches the stored
    /// counter, meaning another promotion has landed since the caller read
    /// this row.
    pub fn has_conflict(&self, expected_counter: u64) -> bool {
        self.optimistic_lock_counter != expected_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_bumps_lock_counter() {
        let mut prompt = ProductionPrompt::new("v1".into(), "initial".into(), "alice".into());
        assert_eq!(prompt.optimistic_lock_counter, 0);
        prompt.promote("v2".into(), "second".into(), "bob".into(), "backups/1".into());
        assert_eq!(prompt.optimistic_lock_counter, 1);
        assert_eq!(prompt.previous_backup_path.as_deref(), Some("backups/1"));
    }

    #[test]
    fn conflict_detected_on_stale_counter() {
        let mut prompt = ProductionPrompt::new("v1".into(), "initial".into(), "alice".into());
        let stale = prompt.optimistic_lock_counter;
        prompt.promote("v2".into(), "second".into(), "bob".into(), "backups/1".into());
        assert!(prompt.has_conflict(stale));
        assert!(!prompt.has_conflict(prompt.optimistic_lock_counter));
    }
}
