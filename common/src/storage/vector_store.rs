//! Vector store gateway (component H): batched upsert, scroll-by-filter,
//! count, and collection introspection over the `chunk` table's HNSW index.
//! Dense retrieval for the retrieval pipeline goes through [`knn_search`].

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::AppError;
use crate::storage::db::SurrealDbClient;
use crate::storage::types::chunk::Chunk;
use crate::storage::types::StoredObject;

/// Upsert a batch of chunks. Each chunk already carries its own id, so this
/// is create-or-replace per row rather than a single bulk INSERT statement.
pub async fn upsert_batch(db: &SurrealDbClient, chunks: Vec<Chunk>) -> Result<(), AppError> {
    for chunk in chunks {
        db.client
            .upsert::<Option<Chunk>>((Chunk::table_name(), chunk.id.clone()))
            .content(chunk)
            .await
            .map_err(AppError::from)?;
    }
    Ok(())
}

/// Field a caller may filter a scroll by when reassembling a document's chunks.
#[derive(Debug, Clone, Copy)]
pub enum ScrollFilter<'a> {
    DocumentId(&'a str),
    Url(&'a str),
    DocumentPk(&'a str),
}

impl ScrollFilter<'_> {
    fn field_name(&self) -> &'static str {
        match self {
            ScrollFilter::DocumentId(_) => "document_id",
            ScrollFilter::Url(_) => "url",
            ScrollFilter::DocumentPk(_) => "document_pk",
        }
    }

    fn value(&self) -> &str {
        match self {
            ScrollFilter::DocumentId(value) | ScrollFilter::Url(value) | ScrollFilter::DocumentPk(value) => value,
        }
    }
}

/// Scroll all chunks matching a filter, ordered by `chunk_index` so callers
/// can reassemble a document's text in order. `field` is always drawn from
/// the closed `ScrollFilter` enum, never from external input, so interpolating
/// it into the query string carries no injection risk.
pub async fn scroll(db: &SurrealDbClient, filter: ScrollFilter<'_>) -> Result<Vec<Chunk>, AppError> {
    let field = filter.field_name();
    let sql = format!("SELECT * FROM chunk WHERE {field} = $value ORDER BY chunk_index ASC");

    let mut response = db.client.query(sql).bind(("value", filter.value().to_owned())).await.map_err(AppError::from)?;

    let chunks: Vec<Chunk> = response.take(0).map_err(AppError::from)?;
    Ok(chunks)
}

/// Number of chunks stored, optionally restricted to one document.
pub async fn count(db: &SurrealDbClient, document_id: Option<&str>) -> Result<usize, AppError> {
    #[derive(Deserialize)]
    struct CountRow {
        count: usize,
    }

    let mut response = match document_id {
        Some(document_id) => db
            .client
            .query("SELECT count() FROM chunk WHERE document_id = $document_id GROUP ALL")
            .bind(("document_id", document_id.to_owned()))
            .await
            .map_err(AppError::from)?,
        None => db.client.query("SELECT count() FROM chunk GROUP ALL").await.map_err(AppError::from)?,
    };

    let rows: Vec<CountRow> = response.take(0).map_err(AppError::from)?;
    Ok(rows.first().map(|r| r.count).unwrap_or(0))
}

/// Introspection snapshot of the chunk collection. Binary quantization is a
/// property of the backing index definition, not something this gateway
/// toggles per query; it is surfaced here for observability only.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: usize,
    pub binary_quantization: bool,
}

pub async fn collection_info(db: &SurrealDbClient) -> Result<CollectionInfo, AppError> {
    Ok(CollectionInfo { points_count: count(db, None).await?, binary_quantization: false })
}

/// One dense ANN hit: the chunk and its cosine-similarity score.
#[derive(Debug, Clone)]
pub struct DenseHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Fetches full chunk rows for a set of ids. Missing ids are silently
/// dropped from the returned map.
pub async fn hydrate_by_ids(db: &SurrealDbClient, ids: &[String]) -> Result<HashMap<String, Chunk>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut response = db
        .client
        .query("SELECT * FROM chunk WHERE id IN $things")
        .bind(("things", ids.iter().map(|id| surrealdb::sql::Thing::from(("chunk", id.as_str()))).collect::<Vec<_>>()))
        .await
        .map_err(AppError::from)?;
    let items: Vec<Chunk> = response.take(0).map_err(AppError::from)?;

    Ok(items.into_iter().map(|chunk| (chunk.id.clone(), chunk)).collect())
}

/// Approximate nearest-neighbor search over the HNSW index. Scores are
/// fetched alongside ids first, then full rows are hydrated by id — this
/// mirrors the ingestion side's two-step FTS query shape and keeps each
/// query narrowly typed.
pub async fn knn_search(db: &SurrealDbClient, query_embedding: &[f32], top_k: usize) -> Result<Vec<DenseHit>, AppError> {
    #[derive(Deserialize)]
    struct ScoreRow {
        id: surrealdb::sql::Thing,
        score: f32,
    }

    let sql = format!(
        "SELECT id, vector::similarity::cosine(embedding, $embedding) AS score \
         FROM chunk WHERE embedding <|{top_k},100|> $embedding \
         ORDER BY score DESC LIMIT {top_k}"
    );

    let mut response = db.client.query(sql).bind(("embedding", query_embedding.to_vec())).await.map_err(AppError::from)?;

    let score_rows: Vec<ScoreRow> = response.take(0).map_err(AppError::from)?;
    if score_rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = score_rows.iter().map(|row| row.id.id.to_raw()).collect();
    let mut by_id = hydrate_by_ids(db, &ids).await?;

    Ok(score_rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id.id.to_raw();
            by_id.remove(&id).map(|chunk| DenseHit { chunk, score: row.score })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::StoredObject;

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string()).await.expect("memory db");
        db.ensure_initialized().await.expect("init schema");
        db
    }

    fn embedding(lead: f32) -> Vec<f32> {
        let mut v = vec![0.0_f32; 1536];
        v[0] = lead;
        v
    }

    fn chunk(document_id: &str, url: &str, chunk_index: u32, text: &str, lead: f32) -> Chunk {
        Chunk::new(document_id.into(), document_id.into(), url.into(), chunk_index, text.into(), 0, text.len(), embedding(lead))
    }

    #[tokio::test]
    async fn upsert_then_scroll_preserves_chunk_order() {
        let db = memory_db().await;
        let chunks = vec![
            chunk("doc-1", "https://www.gov.uk/a", 1, "second", 0.2),
            chunk("doc-1", "https://www.gov.uk/a", 0, "first", 0.1),
        ];
        upsert_batch(&db, chunks).await.expect("upsert");

        let scrolled = scroll(&db, ScrollFilter::DocumentId("doc-1")).await.expect("scroll");
        assert_eq!(scrolled.len(), 2);
        assert_eq!(scrolled[0].chunk_index, 0);
        assert_eq!(scrolled[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn scroll_by_url_and_document_pk() {
        let db = memory_db().await;
        upsert_batch(&db, vec![chunk("doc-1", "https://www.gov.uk/a", 0, "a", 0.1)]).await.expect("upsert");

        let by_url = scroll(&db, ScrollFilter::Url("https://www.gov.uk/a")).await.expect("scroll by url");
        assert_eq!(by_url.len(), 1);

        let by_pk = scroll(&db, ScrollFilter::DocumentPk("doc-1")).await.expect("scroll by pk");
        assert_eq!(by_pk.len(), 1);
    }

    #[tokio::test]
    async fn count_is_scoped_to_document() {
        let db = memory_db().await;
        upsert_batch(
            &db,
            vec![chunk("doc-a", "https://www.gov.uk/a", 0, "a", 0.1), chunk("doc-b", "https://www.gov.uk/b", 0, "b", 0.2)],
        )
        .await
        .expect("upsert");

        assert_eq!(count(&db, Some("doc-a")).await.expect("count a"), 1);
        assert_eq!(count(&db, None).await.expect("count all"), 2);
    }
}
