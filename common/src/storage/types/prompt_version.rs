use chrono::Duration;

use crate::error::AppError;
use crate::stored_object;

pub const MAX_PROMPT_TEXT_CHARS: usize = 10_000;
pub const HARD_DELETE_AFTER_DAYS: i64 = 30;

stored_object!(PromptVersion, "prompt_version", {
    name: String,
    prompt_text: String,
    author_id: String,
    notes: Option<String>,
    #[serde(serialize_with = "serialize_option_datetime", deserialize_with = "deserialize_option_datetime", default)]
    deleted_at: Option<DateTime<Utc>>,
    optimistic_lock_counter: u64
});

impl PromptVersion {
    pub fn new(name: String, prompt_text: String, author_id: String, notes: Option<String>) -> Result<Self, AppError> {
        if prompt_text.chars().count() > MAX_PROMPT_TEXT_CHARS {
            return Err(AppError::Validation(format!(
                "prompt text exceeds {MAX_PROMPT_TEXT_CHARS} characters"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            name,
            prompt_text,
            author_id,
            notes,
            deleted_at: None,
            optimistic_lock_counter: 0,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(Utc::now());
        self.updated_at = self.deleted_at.expect("just set");
    }

    pub fn restore(&mut self) {
        self.deleted_at = None;
        self.updated_at = Utc::now();
    }

    /// A soft-deleted version can only be hard-deleted once the retention
    /// window has elapsed (§3 lifecycle rules).
    pub fn eligible_for_hard_delete(&self, now: DateTime<Utc>) -> bool {
        match self.deleted_at {
            Some(deleted_at) => now - deleted_at >= Duration::days(HARD_DELETE_AFTER_DAYS),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_prompt_text() {
        let too_long = "a".repeat(MAX_PROMPT_TEXT_CHARS + 1);
        let err = PromptVersion::new("v1".into(), too_long, "alice".into(), None).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn hard_delete_requires_retention_window() {
        let mut version = PromptVersion::new("v1".into(), "text".into(), "alice".into(), None).expect("valid");
        assert!(!version.eligible_for_hard_delete(Utc::now()));
        version.soft_delete();
        assert!(!version.eligible_for_hard_delete(Utc::now()));
        let past_window = version.deleted_at.expect("set") + Duration::days(HARD_DELETE_AFTER_DAYS + 1);
        assert!(version.eligible_for_hard_delete(past_window));
    }

    #[test]
    fn restore_clears_deleted_at() {
        let mut version = PromptVersion::new("v1".into(), "text".into(), "alice".into(), None).expect("valid");
        version.soft_delete();
        assert!(version.is_deleted());
        version.restore();
        assert!(!version.is_deleted());
    }
}
