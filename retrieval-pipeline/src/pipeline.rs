//! Retrieval pipeline (component J): query preprocessing, dense retrieval,
//! optional hybrid fusion, optional reranking. Each stage is gated by a
//! feature flag on [`RetrievalConfig`].

use std::time::Instant;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::vector_store::knn_search;
use common::utils::embedding::generate_embedding;

use crate::lexical_index;
use crate::query_preprocessing::expand_acronyms;
use crate::reranking::RerankerLease;
use crate::scoring::{reciprocal_rank_fusion, Scored};

/// Feature flags toggling the optional stages of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub query_rewrite_enabled: bool,
    pub hybrid_search_enabled: bool,
    pub reranking_enabled: bool,
    pub top_k: usize,
    pub rerank_top_k: usize,
    pub rrf_bm25_weight: f32,
    pub rrf_k: u32,
    pub embedding_model: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            query_rewrite_enabled: true,
            hybrid_search_enabled: true,
            reranking_enabled: false,
            top_k: 10,
            rerank_top_k: 5,
            rrf_bm25_weight: 0.3,
            rrf_k: 60,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Metadata describing which stages actually ran for a given query.
#[derive(Debug, Clone)]
pub struct RetrievalDiagnostics {
    pub took_ms: u128,
    pub total_results: usize,
    pub query_preprocessed: bool,
    pub hybrid_search_used: bool,
    pub reranking_used: bool,
}

pub struct RetrievalOutput {
    pub results: Vec<Scored>,
    pub diagnostics: RetrievalDiagnostics,
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    query: &str,
    config: &RetrievalConfig,
    reranker: Option<&RerankerLease>,
) -> Result<RetrievalOutput, AppError> {
    let started = Instant::now();

    let preprocessed = if config.query_rewrite_enabled {
        expand_acronyms(query)
    } else {
        crate::query_preprocessing::PreprocessedQuery {
            original_query: query.to_string(),
            expanded_query: query.to_string(),
        }
    };

    let query_embedding = generate_embedding(openai_client, &config.embedding_model, &preprocessed.expanded_query).await?;

    let dense_hits = knn_search(db, &query_embedding, config.top_k).await?;

    let fused = if config.hybrid_search_enabled {
        let bm25_hits = lexical_index::search_top_k(db, &preprocessed.expanded_query, 5 * config.top_k).await?;
        reciprocal_rank_fusion(db, dense_hits, &bm25_hits, config.rrf_bm25_weight, config.rrf_k, config.top_k).await?
    } else {
        dense_hits
            .into_iter()
            .map(|hit| Scored { chunk: hit.chunk, score: hit.score })
            .collect()
    };

    let (results, reranking_used) = if config.reranking_enabled {
        match reranker {
            Some(lease) => (apply_reranking(lease, &preprocessed.expanded_query, fused, config.rerank_top_k).await?, true),
            None => (fused, false),
        }
    } else {
        (fused, false)
    };

    Ok(RetrievalOutput {
        diagnostics: RetrievalDiagnostics {
            took_ms: started.elapsed().as_millis(),
            total_results: results.len(),
            query_preprocessed: preprocessed.was_expanded(),
            hybrid_search_used: config.hybrid_search_enabled,
            reranking_used,
        },
        results,
    })
}

/// Rerank fused hits with a cross-encoder, keeping the top `rerank_top_k`
/// by the reranker's own score.
async fn apply_reranking(lease: &RerankerLease, query: &str, fused: Vec<Scored>, rerank_top_k: usize) -> Result<Vec<Scored>, AppError> {
    if fused.is_empty() {
        return Ok(fused);
    }

    let documents: Vec<String> = fused.iter().map(|scored| scored.chunk.chunk_text.clone()).collect();
    let rerank_results = lease.rerank(query, documents).await?;

    let mut by_index: Vec<Option<Scored>> = fused.into_iter().map(Some).collect();
    let mut reranked = Vec::with_capacity(rerank_results.len());

    for result in rerank_results {
        if let Some(slot) = by_index.get_mut(result.index) {
            if let Some(mut scored) = slot.take() {
                scored.score = result.score;
                reranked.push(scored);
            }
        }
    }

    reranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    reranked.truncate(rerank_top_k);
    Ok(reranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_rewrite_and_hybrid_but_not_reranking() {
        let config = RetrievalConfig::default();
        assert!(config.query_rewrite_enabled);
        assert!(config.hybrid_search_enabled);
        assert!(!config.reranking_enabled);
        assert_eq!(config.rrf_k, 60);
    }
}
