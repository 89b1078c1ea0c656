use serde_json::Value;

use crate::stored_object;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOutcome {
    Success,
    Failure,
}

stored_object!(AuditLogEntry, "audit_log", {
    event: String,
    actor: String,
    subject: String,
    outcome: AuditOutcome,
    context: Value
});

impl AuditLogEntry {
    pub fn new(event: String, actor: String, subject: String, outcome: AuditOutcome, context: Value) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            event,
            actor,
            subject,
            outcome,
            context,
        }
    }

    pub fn success(event: impl Into<String>, actor: impl Into<String>, subject: impl Into<String>, context: Value) -> Self {
        Self::new(event.into(), actor.into(), subject.into(), AuditOutcome::Success, context)
    }

    pub fn failure(event: impl Into<String>, actor: impl Into<String>, subject: impl Into<String>, context: Value) -> Self {
        Self::new(event.into(), actor.into(), subject.into(), AuditOutcome::Failure, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_and_failure_constructors_set_outcome() {
        let ok = AuditLogEntry::success("prompt.promote", "alice", "production", json!({"version": "v2"}));
        assert_eq!(ok.outcome, AuditOutcome::Success);

        let err = AuditLogEntry::failure("prompt.promote", "alice", "production", json!({"reason": "conflict"}));
        assert_eq!(err.outcome, AuditOutcome::Failure);
    }
}
