//! Lexical index gateway (component I): read-only BM25 search over chunk
//! text. Index construction happens on the ingestion write path; this
//! module only queries the `idx_chunk_fts` index defined in
//! `common::storage::indexes`.

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use serde::Deserialize;

/// One BM25 hit: which document it came from, its score, and its rank
/// (1-based) within this query's result set.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub document_id: String,
    pub chunk_id: String,
    pub score: f32,
    pub rank: u32,
}

/// Query the BM25 index for the top-k chunks matching `terms`, keyed by
/// document_id on the way out (chunk_id is retained so hybrid fusion can
/// still operate at chunk granularity).
pub async fn search_top_k(db: &SurrealDbClient, terms: &str, top_k: usize) -> Result<Vec<LexicalHit>, AppError> {
    #[derive(Deserialize)]
    struct Row {
        id: surrealdb::sql::Thing,
        document_id: String,
        bm25_score: Option<f32>,
    }

    let sql = "SELECT id, document_id, \
               (IF search::score(0) != NONE THEN search::score(0) ELSE 0 END) AS bm25_score \
               FROM chunk WHERE chunk_text @0@ $terms \
               ORDER BY bm25_score DESC LIMIT $limit";

    let mut response = db
        .client
        .query(sql)
        .bind(("terms", terms.to_owned()))
        .bind(("limit", top_k as i64))
        .await
        .map_err(AppError::from)?;

    let rows: Vec<Row> = response.take(0).map_err(AppError::from)?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| LexicalHit {
            document_id: row.document_id,
            chunk_id: row.id.id.to_raw(),
            score: row.bm25_score.unwrap_or_default(),
            rank: (index + 1) as u32,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::chunk::Chunk;

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string()).await.expect("memory db");
        db.ensure_initialized().await.expect("init schema");
        db
    }

    #[tokio::test]
    async fn search_ranks_matches_by_bm25_score() {
        let db = memory_db().await;
        db.client
            .create::<Option<Chunk>>(("chunk", "c1"))
            .content(Chunk::new(
                "doc-1".into(),
                "doc-1".into(),
                "https://www.gov.uk/apply-passport".into(),
                0,
                "Apply for a British passport online".into(),
                0,
                40,
                vec![0.0; 1536],
            ))
            .await
            .expect("insert chunk");
        db.client
            .create::<Option<Chunk>>(("chunk", "c2"))
            .content(Chunk::new(
                "doc-2".into(),
                "doc-2".into(),
                "https://www.gov.uk/council-tax-exemption".into(),
                0,
                "Council tax exemption guidance".into(),
                0,
                30,
                vec![0.0; 1536],
            ))
            .await
            .expect("insert chunk");

        let hits = search_top_k(&db, "passport", 10).await.expect("fts query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "doc-1");
        assert_eq!(hits[0].rank, 1);
    }
}
