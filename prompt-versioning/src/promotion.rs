//! Prompt promotion (component K, promotion half): preview a pending
//! promotion's diff, then promote under an optimistic-lock compare-and-swap
//! with an external backup write and an audit trail.

use bytes::Bytes;
use chrono::Utc;
use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::store::StorageManager;
use common::storage::types::audit_log::AuditLogEntry;
use common::storage::types::production_prompt::{ProductionPrompt, PRODUCTION_PROMPT_ID};
use common::storage::types::prompt_version::PromptVersion;
use common::storage::types::StoredObject;

use crate::versions::get_version;

/// Diff summary between a candidate version and the current production text.
#[derive(Debug, Clone)]
pub struct PromotionPreview {
    pub version_id: String,
    pub char_delta: i64,
    pub line_delta: i64,
    pub estimated_backup_bytes: usize,
}

pub async fn preview(db: &SurrealDbClient, version_id: &str) -> Result<PromotionPreview, AppError> {
    let version = get_version(db, version_id).await?.ok_or_else(|| AppError::NotFound(version_id.to_string()))?;
    let production = get_or_init_production(db).await?;

    let char_delta = version.prompt_text.chars().count() as i64 - production.prompt_text.chars().count() as i64;
    let line_delta = version.prompt_text.lines().count() as i64 - production.prompt_text.lines().count() as i64;

    Ok(PromotionPreview {
        version_id: version_id.to_string(),
        char_delta,
        line_delta,
        estimated_backup_bytes: production.prompt_text.len(),
    })
}

/// Ensure the singleton `ProductionPrompt` row exists. Startup should call
/// this once so the "exactly one row after init" invariant always holds.
pub async fn get_or_init_production(db: &SurrealDbClient) -> Result<ProductionPrompt, AppError> {
    if let Some(existing) = db.get_item::<ProductionPrompt>(PRODUCTION_PROMPT_ID).await.map_err(AppError::from)? {
        return Ok(existing);
    }
    let fresh = ProductionPrompt::new(String::new(), String::new(), "system".to_string());
    let stored = db.store_item(fresh.clone()).await.map_err(AppError::from)?;
    Ok(stored.unwrap_or(fresh))
}

/// Promote a version to production. Exactly one concurrent caller racing on
/// the same starting counter succeeds; the rest observe [`AppError::Conflict`]
/// and must re-read and retry.
pub async fn promote(db: &SurrealDbClient, storage: &StorageManager, version_id: &str, actor_id: &str, confirmation: bool) -> Result<ProductionPrompt, AppError> {
    if !confirmation {
        return Err(AppError::Validation("promotion requires explicit confirmation".into()));
    }

    let version: PromptVersion = get_version(db, version_id).await?.ok_or_else(|| AppError::NotFound(version_id.to_string()))?;
    if version.is_deleted() {
        return Err(AppError::Validation("cannot promote a soft-deleted version".into()));
    }

    let production = get_or_init_production(db).await?;
    let expected_counter = production.optimistic_lock_counter;

    let backup_path = format!("prompt-backups/{}.md", Utc::now().to_rfc3339());
    if let Err(err) = storage.put(&backup_path, Bytes::from(production.prompt_text.clone())).await {
        record_failure(db, actor_id, &version.name, "object store backup write failed").await?;
        return Err(AppError::ObjectStore(err));
    }

    let mut updated = production.clone();
    updated.promote(version.prompt_text.clone(), version.name.clone(), actor_id.to_string(), backup_path.clone());

    match compare_and_swap(db, &updated, expected_counter).await? {
        Some(stored) => {
            let entry = AuditLogEntry::success(
                "prompt.promote",
                actor_id,
                PRODUCTION_PROMPT_ID,
                serde_json::json!({
                    "version": version.name,
                    "backup_path": backup_path,
                    "prior_promoter": production.promoter_id,
                }),
            );
            db.store_item(entry).await.map_err(AppError::from)?;
            Ok(stored)
        }
        None => {
            record_failure(db, actor_id, &version.name, "optimistic lock conflict").await?;
            Err(AppError::Conflict(format!("production prompt changed concurrently (expected counter {expected_counter})")))
        }
    }
}

async fn record_failure(db: &SurrealDbClient, actor_id: &str, version_name: &str, reason: &str) -> Result<(), AppError> {
    let entry = AuditLogEntry::failure("prompt.promote", actor_id, PRODUCTION_PROMPT_ID, serde_json::json!({"version": version_name, "reason": reason}));
    db.store_item(entry).await.map_err(AppError::from)?;
    Ok(())
}

/// Compare-and-swap the singleton row in one transaction: the `UPDATE`
/// only touches the row when the counter still matches what the caller
/// read, so a concurrent promoter's earlier write makes this a no-op.
async fn compare_and_swap(db: &SurrealDbClient, updated: &ProductionPrompt, expected_counter: u64) -> Result<Option<ProductionPrompt>, AppError> {
    let response = db
        .client
        .query("BEGIN TRANSACTION;")
        .query(
            "UPDATE type::thing('production_prompt', $id) SET \
             prompt_text = $prompt_text, promoted_version_name = $promoted_version_name, \
             promoter_id = $promoter_id, previous_backup_path = $previous_backup_path, \
             optimistic_lock_counter = $new_counter, updated_at = time::now() \
             WHERE optimistic_lock_counter = $expected_counter;",
        )
        .query("COMMIT TRANSACTION;")
        .bind(("id", PRODUCTION_PROMPT_ID))
        .bind(("prompt_text", updated.prompt_text.clone()))
        .bind(("promoted_version_name", updated.promoted_version_name.clone()))
        .bind(("promoter_id", updated.promoter_id.clone()))
        .bind(("previous_backup_path", updated.previous_backup_path.clone()))
        .bind(("new_counter", updated.optimistic_lock_counter))
        .bind(("expected_counter", expected_counter))
        .await
        .map_err(AppError::from)?;

    let mut response = response.check().map_err(AppError::from)?;
    let rows: Vec<ProductionPrompt> = response.take(1).map_err(AppError::from)?;
    Ok(rows.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::utils::config::{AppConfig, StorageKind};

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string()).await.expect("memory db");
        db.ensure_initialized().await.expect("init schema");
        db
    }

    async fn memory_storage() -> StorageManager {
        let config = AppConfig { storage: StorageKind::Memory, ..Default::default() };
        StorageManager::new(&config).await.expect("storage manager")
    }

    #[tokio::test]
    async fn promote_writes_backup_and_bumps_counter() {
        let db = memory_db().await;
        let storage = memory_storage().await;

        get_or_init_production(&db).await.expect("init singleton");
        let version = crate::versions::create_version(&db, "v1".into(), "new prompt text".into(), "alice".into(), None).await.expect("create version");

        let promoted = promote(&db, &storage, &version.id, "alice", true).await.expect("promote");
        assert_eq!(promoted.prompt_text, "new prompt text");
        assert_eq!(promoted.optimistic_lock_counter, 1);
        assert!(promoted.previous_backup_path.is_some());
    }

    #[tokio::test]
    async fn rejects_promotion_without_confirmation() {
        let db = memory_db().await;
        let storage = memory_storage().await;
        let version = crate::versions::create_version(&db, "v1".into(), "text".into(), "alice".into(), None).await.expect("create version");

        let err = promote(&db, &storage, &version.id, "alice", false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_promoting_a_soft_deleted_version() {
        let db = memory_db().await;
        let storage = memory_storage().await;
        let version = crate::versions::create_version(&db, "v1".into(), "text".into(), "alice".into(), None).await.expect("create version");
        crate::versions::soft_delete_version(&db, &version.id).await.expect("soft delete");

        let err = promote(&db, &storage, &version.id, "alice", true).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn second_promoter_with_stale_counter_gets_conflict() {
        let db = memory_db().await;
        let storage = memory_storage().await;
        get_or_init_production(&db).await.expect("init singleton");

        let v1 = crate::versions::create_version(&db, "v1".into(), "text one".into(), "alice".into(), None).await.expect("create v1");
        let v2 = crate::versions::create_version(&db, "v2".into(), "text two".into(), "bob".into(), None).await.expect("create v2");

        promote(&db, &storage, &v1.id, "alice", true).await.expect("first promotion succeeds");

        // bob read the production row before alice's promotion landed, so his
        // compare-and-swap now targets a stale counter.
        let stale_production = ProductionPrompt::new(String::new(), String::new(), "system".into());
        let err = compare_and_swap(&db, &{
            let mut p = stale_production.clone();
            p.promote(v2.prompt_text.clone(), v2.name.clone(), "bob".into(), "prompt-backups/stale.md".into());
            p
        }, stale_production.optimistic_lock_counter)
        .await
        .expect("cas call succeeds");
        assert!(err.is_none(), "stale counter must not apply");
    }
}
