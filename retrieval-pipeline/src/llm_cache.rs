//! Content-addressable LLM cache (component F): translation cache with
//! explicit insert-race handling, chunked fan-out for large documents, and
//! a separate summary cache with a word-count contract.

use std::future::Future;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::summary_cache::SummaryCacheEntry;
use common::storage::types::translation_cache::TranslationCacheEntry;
use common::storage::types::StoredObject;
use futures::stream::{FuturesUnordered, StreamExt};

use ingestion_pipeline::chunker::{chunk_text, combine_translated_chunks, needs_chunked_translation};

/// What happened when writing a freshly generated translation to the cache.
#[derive(Debug)]
pub enum InsertOutcome {
    /// This call's write won; `entry` is what's now in the cache.
    Inserted(TranslationCacheEntry),
    /// A concurrent writer won the race; `entry` is their (equivalent) result.
    LostRace(TranslationCacheEntry),
}

/// Cache key for a single translation lookup.
#[derive(Debug, Clone)]
pub struct CacheKey<'a> {
    pub document_id: &'a str,
    pub chunk_index: Option<u32>,
    pub source_hash: &'a str,
    pub reading_level: &'a str,
    pub prompt_hash: &'a str,
    pub model_used: &'a str,
}

async fn lookup(db: &SurrealDbClient, key: &CacheKey<'_>) -> Result<Option<TranslationCacheEntry>, AppError> {
    let mut response = db
        .client
        .query(
            "SELECT * FROM translation_cache WHERE document_id = $document_id \
             AND chunk_index = $chunk_index AND source_hash = $source_hash \
             AND reading_level = $reading_level AND prompt_hash = $prompt_hash \
             AND model_used = $model_used LIMIT 1",
        )
        .bind(("document_id", key.document_id.to_string()))
        .bind(("chunk_index", key.chunk_index))
        .bind(("source_hash", key.source_hash.to_string()))
        .bind(("reading_level", key.reading_level.to_string()))
        .bind(("prompt_hash", key.prompt_hash.to_string()))
        .bind(("model_used", key.model_used.to_string()))
        .await
        .map_err(AppError::from)?;

    let rows: Vec<TranslationCacheEntry> = response.take(0).map_err(AppError::from)?;
    Ok(rows.into_iter().next())
}

/// Insert a translation, recovering from a concurrent winner. Recurses once
/// on a re-read miss (the spec's "further misses are an error" bound).
async fn insert_or_recover(db: &SurrealDbClient, entry: TranslationCacheEntry, key: &CacheKey<'_>, allow_recurse: bool) -> Result<InsertOutcome, AppError> {
    match db.store_item(entry.clone()).await {
        Ok(Some(stored)) => Ok(InsertOutcome::Inserted(stored)),
        Ok(None) => Ok(InsertOutcome::Inserted(entry)),
        Err(_unique_violation) => match lookup(db, key).await? {
            Some(winner) => Ok(InsertOutcome::LostRace(winner)),
            None if allow_recurse => {
                let retry = TranslationCacheEntry::new(
                    key.document_id.to_string(),
                    key.chunk_index,
                    key.source_hash.to_string(),
                    key.reading_level.to_string(),
                    key.prompt_hash.to_string(),
                    key.model_used.to_string(),
                    entry.translated_text.clone(),
                );
                Box::pin(insert_or_recover(db, retry, key, false)).await
            }
            None => Err(AppError::Processing("translation cache insert failed and re-read still misses".into())),
        },
    }
}

/// Look up a translation, generating and caching it on miss. `generate`
/// performs the actual LLM call and is only invoked when the cache misses.
pub async fn get_or_generate_translation<G, F>(db: &SurrealDbClient, key: CacheKey<'_>, generate: G) -> Result<TranslationCacheEntry, AppError>
where
    G: FnOnce() -> F,
    F: Future<Output = Result<String, AppError>>,
{
    if let Some(hit) = lookup(db, &key).await? {
        return Ok(hit);
    }

    let translated_text = generate().await?;
    let entry = TranslationCacheEntry::new(
        key.document_id.to_string(),
        key.chunk_index,
        key.source_hash.to_string(),
        key.reading_level.to_string(),
        key.prompt_hash.to_string(),
        key.model_used.to_string(),
        translated_text,
    );

    match insert_or_recover(db, entry, &key, true).await? {
        InsertOutcome::Inserted(entry) | InsertOutcome::LostRace(entry) => Ok(entry),
    }
}

/// Outcome of translating a (possibly chunked) document: the combined text
/// plus how many chunks were processed and how many were cache hits.
#[derive(Debug)]
pub struct ChunkedTranslationResult {
    pub combined_text: String,
    pub chunks_processed: usize,
    pub chunks_cached: usize,
}

/// Translate a document, splitting into chunks per §4.D when the estimated
/// output would exceed the model's budget. Chunks translate concurrently
/// (bounded fan-out) and are cached independently.
pub async fn translate_document<G, F>(
    db: &SurrealDbClient,
    document_id: &str,
    source_text: &str,
    source_hash: &str,
    reading_level: &str,
    prompt_hash: &str,
    model_used: &str,
    concurrency: usize,
    generate_chunk: G,
) -> Result<ChunkedTranslationResult, AppError>
where
    G: Fn(String) -> F + Clone,
    F: Future<Output = Result<String, AppError>>,
{
    let estimated_input_tokens = source_text.len() / 4;
    if !needs_chunked_translation(estimated_input_tokens, model_used) {
        let key = CacheKey {
            document_id,
            chunk_index: None,
            source_hash,
            reading_level,
            prompt_hash,
            model_used,
        };
        let cache_hit = lookup(db, &key).await?.is_some();
        let entry = get_or_generate_translation(db, key, || generate_chunk(source_text.to_string())).await?;
        return Ok(ChunkedTranslationResult {
            combined_text: entry.translated_text,
            chunks_processed: 1,
            chunks_cached: usize::from(cache_hit),
        });
    }

    let chunks = chunk_text(source_text, 2048);
    let mut cached_count = 0usize;
    for (index, _chunk) in chunks.iter().enumerate() {
        if lookup(
            db,
            &CacheKey {
                document_id,
                chunk_index: Some(index as u32),
                source_hash,
                reading_level,
                prompt_hash,
                model_used,
            },
        )
        .await?
        .is_some()
        {
            cached_count += 1;
        }
    }

    let mut pending = FuturesUnordered::new();
    let mut translated: Vec<Option<String>> = vec![None; chunks.len()];
    let mut iter = chunks.iter().cloned().enumerate();

    for (index, chunk) in iter.by_ref().take(concurrency) {
        pending.push(translate_one_chunk(db, document_id, chunk.text, index as u32, source_hash, reading_level, prompt_hash, model_used, generate_chunk.clone()));
    }

    while let Some(result) = pending.next().await {
        let (index, text) = result?;
        translated[index] = Some(text);
        if let Some((next_index, chunk)) = iter.next() {
            pending.push(translate_one_chunk(
                db,
                document_id,
                chunk.text,
                next_index as u32,
                source_hash,
                reading_level,
                prompt_hash,
                model_used,
                generate_chunk.clone(),
            ));
        }
    }

    let ordered: Vec<String> = translated.into_iter().map(|t| t.expect("every chunk index filled")).collect();
    let combined_text = combine_translated_chunks(&ordered);

    Ok(ChunkedTranslationResult {
        combined_text,
        chunks_processed: chunks.len(),
        chunks_cached: cached_count,
    })
}

#[allow(clippy::too_many_arguments)]
async fn translate_one_chunk<G, F>(
    db: &SurrealDbClient,
    document_id: &str,
    chunk_text: String,
    chunk_index: u32,
    source_hash: &str,
    reading_level: &str,
    prompt_hash: &str,
    model_used: &str,
    generate_chunk: G,
) -> Result<(usize, String), AppError>
where
    G: Fn(String) -> F,
    F: Future<Output = Result<String, AppError>>,
{
    let key = CacheKey {
        document_id,
        chunk_index: Some(chunk_index),
        source_hash,
        reading_level,
        prompt_hash,
        model_used,
    };
    let entry = get_or_generate_translation(db, key, || generate_chunk(chunk_text)).await?;
    Ok((chunk_index as usize, entry.translated_text))
}

/// Look up a cached summary, regenerating it if missing, expired, or stale
/// relative to the current source hash.
pub async fn get_or_generate_summary<G, F>(db: &SurrealDbClient, document_id: &str, source_hash: &str, generate: G) -> Result<SummaryCacheEntry, AppError>
where
    G: FnOnce() -> F,
    F: Future<Output = Result<String, AppError>>,
{
    let mut response = db
        .client
        .query("SELECT * FROM summary_cache WHERE document_id = $document_id LIMIT 1")
        .bind(("document_id", document_id.to_string()))
        .await
        .map_err(AppError::from)?;
    let existing: Option<SummaryCacheEntry> = response.take::<Vec<SummaryCacheEntry>>(0).map_err(AppError::from)?.into_iter().next();

    if let Some(entry) = existing {
        if !entry.is_expired(chrono::Utc::now()) && !entry.is_stale(source_hash) {
            return Ok(entry);
        }
    }

    let summary_text = generate().await?;
    let entry = SummaryCacheEntry::new(document_id.to_string(), source_hash.to_string(), summary_text);
    let stored = db.store_item(entry.clone()).await.map_err(AppError::from)?;
    Ok(stored.unwrap_or(entry))
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
    async fn generates_on_miss_and_hits_cache_on_second_call() {
        let db = memory_db().await;
        let mut calls = 0;

        let key = || CacheKey {
            document_id: "doc-1",
            chunk_index: None,
            source_hash: "hash-1",
            reading_level: "easy",
            prompt_hash: "prompt-1",
            model_used: "gpt-4o-mini",
        };

        let first = get_or_generate_translation(&db, key(), || {
            calls += 1;
            async { Ok("translated text".to_string()) }
        })
        .await
        .expect("first call generates");
        assert_eq!(first.translated_text, "translated text");
        assert_eq!(calls, 1);

        let second = get_or_generate_translation(&db, key(), || {
            calls += 1;
            async { Ok("should not be used".to_string()) }
        })
        .await
        .expect("second call hits cache");
        assert_eq!(second.translated_text, "translated text");
        assert_eq!(calls, 1, "generate must not run again on a cache hit");
    }

    #[tokio::test]
    async fn monolithic_and_chunked_entries_are_independent_cache_rows() {
        let db = memory_db().await;

        let whole = get_or_generate_translation(
            &db,
            CacheKey { document_id: "doc-2", chunk_index: None, source_hash: "h", reading_level: "easy", prompt_hash: "p", model_used: "m" },
            || async { Ok("whole document".to_string()) },
        )
        .await
        .expect("monolithic insert");

        let chunk = get_or_generate_translation(
            &db,
            CacheKey { document_id: "doc-2", chunk_index: Some(0), source_hash: "h", reading_level: "easy", prompt_hash: "p", model_used: "m" },
            || async { Ok("chunk zero".to_string()) },
        )
        .await
        .expect("chunk insert");

        assert_ne!(whole.id, chunk.id);
        assert_eq!(whole.translated_text, "whole document");
        assert_eq!(chunk.translated_text, "chunk zero");
    }

    #[tokio::test]
    async fn summary_regenerates_when_source_hash_changes() {
        let db = memory_db().await;

        let first = get_or_generate_summary(&db, "doc-3", "hash-a", || async { Ok("word ".repeat(180)) }).await.expect("first summary");
        assert!(first.is_length_valid());

        let second = get_or_generate_summary(&db, "doc-3", "hash-b", || async { Ok("different ".repeat(180)) }).await.expect("second summary");
        assert_ne!(first.summary_text, second.summary_text);
        assert_eq!(second.source_hash, "hash-b");
    }
}
