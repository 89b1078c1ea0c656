//! Prompt version CRUD and lifecycle (component K, version management
//! half): create, list, soft-delete, restore, and gated hard-delete.

use chrono::Utc;
use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::prompt_version::PromptVersion;
use common::storage::types::StoredObject;
use serde::Deserialize;

/// Create a version, rejecting a name already in use by an active or
/// soft-deleted version (names stay unique across both).
pub async fn create_version(db: &SurrealDbClient, name: String, prompt_text: String, author_id: String, notes: Option<String>) -> Result<PromptVersion, AppError> {
    if name_exists(db, &name).await? {
        return Err(AppError::Conflict(format!("prompt version name '{name}' already in use")));
    }

    let version = PromptVersion::new(name, prompt_text, author_id, notes)?;
    let stored = db.store_item(version.clone()).await.map_err(AppError::from)?;
    Ok(stored.unwrap_or(version))
}

async fn name_exists(db: &SurrealDbClient, name: &str) -> Result<bool, AppError> {
    #[derive(Deserialize)]
    struct Row {
        #[allow(dead_code)]
        id: surrealdb::sql::Thing,
    }

    let mut response = db
        .client
        .query("SELECT id FROM prompt_version WHERE name = $name LIMIT 1")
        .bind(("name", name.to_owned()))
        .await
        .map_err(AppError::from)?;

    let rows: Vec<Row> = response.take(0).map_err(AppError::from)?;
    Ok(!rows.is_empty())
}

pub async fn get_version(db: &SurrealDbClient, id: &str) -> Result<Option<PromptVersion>, AppError> {
    db.get_item(id).await.map_err(AppError::from)
}

/// List versions ordered by creation time, descending. `include_deleted`
/// controls whether soft-deleted rows are returned.
pub async fn list_versions(db: &SurrealDbClient, include_deleted: bool) -> Result<Vec<PromptVersion>, AppError> {
    let sql = if include_deleted {
        "SELECT * FROM prompt_version ORDER BY created_at DESC"
    } else {
        "SELECT * FROM prompt_version WHERE deleted_at IS NONE ORDER BY created_at DESC"
    };
    let mut response = db.client.query(sql).await.map_err(AppError::from)?;
    response.take(0).map_err(AppError::from)
}

pub async fn soft_delete_version(db: &SurrealDbClient, id: &str) -> Result<PromptVersion, AppError> {
    let mut version: PromptVersion = db.get_item(id).await.map_err(AppError::from)?.ok_or_else(|| AppError::NotFound(id.to_string()))?;
    if version.is_deleted() {
        return Ok(version);
    }
    version.soft_delete();
    let stored = db.store_item(version.clone()).await.map_err(AppError::from)?;
    Ok(stored.unwrap_or(version))
}

pub async fn restore_version(db: &SurrealDbClient, id: &str) -> Result<PromptVersion, AppError> {
    let mut version: PromptVersion = db.get_item(id).await.map_err(AppError::from)?.ok_or_else(|| AppError::NotFound(id.to_string()))?;
    version.restore();
    let stored = db.store_item(version.clone()).await.map_err(AppError::from)?;
    Ok(stored.unwrap_or(version))
}

/// Hard-delete is only permitted once the soft-delete retention window has
/// elapsed; anything else is rejected rather than silently skipped.
pub async fn hard_delete_version(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
    let version: PromptVersion = db.get_item(id).await.map_err(AppError::from)?.ok_or_else(|| AppError::NotFound(id.to_string()))?;
    if !version.eligible_for_hard_delete(Utc::now()) {
        return Err(AppError::Validation("version is not eligible for hard delete yet".into()));
    }
    db.delete_item::<PromptVersion>(id).await.map_err(AppError::from)?;
    Ok(())
}
