//! Hybrid-search score fusion (component J, stage 4): Reciprocal Rank
//! Fusion over a dense ANN ranking and a BM25 ranking.

use std::collections::HashMap;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::chunk::Chunk;
use common::storage::vector_store::{hydrate_by_ids, DenseHit};

use crate::lexical_index::LexicalHit;

/// A chunk carrying its fused retrieval score. `score` is always the RRF
/// value computed by [`reciprocal_rank_fusion`] — never the original dense
/// similarity — so callers never need to know which signal produced it.
#[derive(Debug, Clone)]
pub struct Scored {
    pub chunk: Chunk,
    pub score: f32,
}

/// Rank assigned to a chunk absent from the BM25 result set. Large enough
/// that `1/(k+999)` contributes effectively nothing to the fused score.
const ABSENT_BM25_RANK: u32 = 999;

/// Rank assigned to a chunk absent from the dense result set, mirroring
/// [`ABSENT_BM25_RANK`] for the opposite signal.
const ABSENT_DENSE_RANK: u32 = 999;

/// Fuse dense and BM25 rankings with `rrf(d) = w/(k+bm25_rank) +
/// (1-w)/(k+dense_rank)`. The candidate set is the union of both rankings —
/// a chunk present only in `bm25` is hydrated from storage rather than
/// dropped — so it can still surface in the fused output. dense_rank and
/// bm25_rank are derived from each slice's own position (1-based). Output is
/// sorted by fused score descending and truncated to `top_k`.
pub async fn reciprocal_rank_fusion(
    db: &SurrealDbClient,
    dense: Vec<DenseHit>,
    bm25: &[LexicalHit],
    weight: f32,
    k: u32,
    top_k: usize,
) -> Result<Vec<Scored>, AppError> {
    let dense_rank_by_chunk_id: HashMap<String, u32> =
        dense.iter().enumerate().map(|(index, hit)| (hit.chunk.id.clone(), (index + 1) as u32)).collect();
    let bm25_rank_by_chunk_id: HashMap<&str, u32> = bm25.iter().map(|hit| (hit.chunk_id.as_str(), hit.rank)).collect();

    let mut chunks_by_id: HashMap<String, Chunk> = dense.into_iter().map(|hit| (hit.chunk.id.clone(), hit.chunk)).collect();

    let bm25_only_ids: Vec<String> = bm25
        .iter()
        .map(|hit| hit.chunk_id.clone())
        .filter(|id| !chunks_by_id.contains_key(id))
        .collect();
    if !bm25_only_ids.is_empty() {
        chunks_by_id.extend(hydrate_by_ids(db, &bm25_only_ids).await?);
    }

    let mut fused: Vec<Scored> = chunks_by_id
        .into_values()
        .map(|chunk| {
            let dense_rank = dense_rank_by_chunk_id.get(chunk.id.as_str()).copied().unwrap_or(ABSENT_DENSE_RANK);
            let bm25_rank = bm25_rank_by_chunk_id.get(chunk.id.as_str()).copied().unwrap_or(ABSENT_BM25_RANK);
            let score = rrf_score(bm25_rank, dense_rank, weight, k);
            Scored { chunk, score }
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(top_k);
    Ok(fused)
}

fn rrf_score(bm25_rank: u32, dense_rank: u32, weight: f32, k: u32) -> f32 {
    let k = k as f32;
    weight / (k + bm25_rank as f32) + (1.0 - weight) / (k + dense_rank as f32)
}
