//! Vector and lexical index definitions backing components H and I.
//!
//! Both gateways are thin wrappers over one SurrealDB instance: the HNSW
//! index gives the vector store gateway its ANN search, the BM25-scored
//! full-text index gives the lexical index gateway its keyword search.

use super::db::SurrealDbClient;

const FTS_ANALYZER_NAME: &str = "guidance_fts_analyzer";

/// Bring every index this schema relies on into existence. Idempotent:
/// `DEFINE ... IF NOT EXISTS` means re-running on an already-initialized
/// database is a no-op.
pub async fn ensure_indexes(db: &SurrealDbClient) -> Result<(), surrealdb::Error> {
    create_fts_analyzer(db).await?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_chunk_embedding ON chunk
             FIELDS embedding HNSW DIMENSION 1536 DIST COSINE TYPE F32 EFC 150 M 12",
        )
        .await?
        .check()?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_chunk_document ON chunk
             FIELDS document_id",
        )
        .await?
        .check()?;

    db.client
        .query(format!(
            "DEFINE INDEX IF NOT EXISTS idx_chunk_fts ON chunk
             FIELDS chunk_text SEARCH ANALYZER {FTS_ANALYZER_NAME} BM25 HIGHLIGHTS"
        ))
        .await?
        .check()?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_document_canonical_url ON document
             FIELDS canonical_url UNIQUE",
        )
        .await?
        .check()?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_translation_cache_key ON translation_cache
             FIELDS document_id, source_hash, reading_level, prompt_hash, model_used UNIQUE",
        )
        .await?
        .check()?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_prompt_version_name ON prompt_version
             FIELDS name UNIQUE",
        )
        .await?
        .check()?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_processing_job_ingestion ON processing_job
             FIELDS ingestion_job_id",
        )
        .await?
        .check()?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_processing_job_batch ON processing_job
             FIELDS reprocessing_batch_id",
        )
        .await?
        .check()?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_processing_queue_priority ON processing_queue
             FIELDS priority, queued_at",
        )
        .await?
        .check()?;

    Ok(())
}

/// Define a stemming full-text analyzer, falling back to an ASCII-only
/// analyzer if the build of SurrealDB in use lacks snowball support.
async fn create_fts_analyzer(db: &SurrealDbClient) -> Result<(), surrealdb::Error> {
    let stemming = db
        .client
        .query(format!(
            "DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER_NAME}
             TOKENIZERS blank, class
             FILTERS lowercase, ascii, snowball(english)"
        ))
        .await;

    if stemming.is_ok() {
        return Ok(());
    }

    db.client
        .query(format!(
            "DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER_NAME}
             TOKENIZERS blank, class
             FILTERS lowercase, ascii"
        ))
        .await?
        .check()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_indexes_is_idempotent() {
        let db = SurrealDbClient::memory("test_ns", "idx_test")
            .await
            .expect("memory db");

        ensure_indexes(&db).await.expect("first pass");
        ensure_indexes(&db).await.expect("second pass is a no-op");
    }
}
