//! Single-document ingestion entry points: turns an upload or a crawled
//! page into a persisted `Document`, ready for the batch control plane to
//! pick up for chunking and vectorization.

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::document::{Document, SourceKind};

use crate::format_decoder;

/// Decodes an uploaded file and stores it as a `Document`. Chrome
/// stripping (if the format is HTML/Markdown-derived) has already run by
/// the time this returns; chunking and vectorization happen later in the
/// batch worker.
pub async fn ingest_upload(db: &SurrealDbClient, filename: &str, content: &[u8], declared_mime: Option<&str>) -> Result<Document, AppError> {
    let decoded = format_decoder::decode(filename, content, declared_mime)?;

    let mut document = Document::new(filename.to_string(), decoded.filename.clone(), decoded.text, SourceKind::Upload);
    document.chrome_removed = decoded.chrome_removed;
    document.chrome_removal_stats = decoded.chrome_removal_stats;

    let stored = db.store_item(document.clone()).await.map_err(AppError::from)?;
    Ok(stored.unwrap_or(document))
}

/// Stores a crawled page as a `Document`, keyed on its canonical URL so a
/// re-crawl updates the existing row rather than creating a duplicate.
pub async fn ingest_crawled_page(
    db: &SurrealDbClient,
    url: &str,
    title: &str,
    text: &str,
) -> Result<Document, AppError> {
    let mut document = Document::new(url.to_string(), title.to_string(), text.to_string(), SourceKind::Url);
    document.chrome_removed = true;

    let stored = db.store_item(document.clone()).await.map_err(AppError::from)?;
    Ok(stored.unwrap_or(document))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string()).await.expect("memory db");
        db.ensure_initialized().await.expect("init schema");
        db
    }

    #[tokio::test]
    async fn ingest_upload_stores_decoded_text() {
        let db = memory_db().await;
        let document = ingest_upload(&db, "guidance.txt", b"plain guidance text", None).await.expect("valid upload");
        assert_eq!(document.raw_content, "plain guidance text");
        assert_eq!(document.source_kind, SourceKind::Upload);
    }

    #[tokio::test]
    async fn ingest_crawled_page_marks_chrome_removed() {
        let db = memory_db().await;
        let document = ingest_crawled_page(&db, "https://www.gov.uk/guidance/apply", "Apply", "guidance text")
            .await
            .expect("valid crawl");
        assert!(document.chrome_removed);
        assert_eq!(document.source_kind, SourceKind::Url);
    }
}
