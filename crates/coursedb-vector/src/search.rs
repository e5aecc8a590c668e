//! Cosine-similarity retrieval over a resident embedding matrix.
//!
//! Cosine is used rather than dot product or Euclidean distance because it
//! ignores vector magnitude, which otherwise tracks text length and would
//! favour long descriptions over short queries.
use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use coursedb_core::error::{Error, Result};
use coursedb_core::traits::Embedder;
use coursedb_core::types::{Catalog, EmbeddingMatrix, ScoredResult};

pub const DEFAULT_TOP_K: usize = 10;

/// Cosine similarity in `[-1, 1]`, accumulated in `f64`.
///
/// Returns exactly `0.0` when either vector has zero norm, when the lengths
/// differ, or when the inputs are not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !sim.is_finite() {
        return 0.0;
    }
    sim.clamp(-1.0, 1.0) as f32
}

/// Score every row against `query` and keep the best `top_k`.
///
/// Sorting is stable, so rows with equal scores stay in catalog order.
pub fn rank_by_vector(query: &[f32], matrix: &EmbeddingMatrix, top_k: usize) -> Vec<ScoredResult> {
    let mut scored: Vec<(usize, f32)> =
        matrix.rows().enumerate().map(|(i, row)| (i, cosine_similarity(query, row))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(pos, (index, score))| ScoredResult { index, score, rank: pos + 1 })
        .collect()
}

/// Ranks catalog records against free-text queries.
///
/// Stateless apart from the shared provider; each `search` embeds the query
/// once and borrows the matrix for the duration of the call.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn search(
        &self,
        query: &str,
        catalog: &Catalog,
        matrix: &EmbeddingMatrix,
        top_k: usize,
    ) -> Result<Vec<ScoredResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query is empty".into()));
        }
        if top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be positive".into()));
        }
        if catalog.is_empty() || matrix.is_empty() {
            return Ok(Vec::new());
        }
        if catalog.len() != matrix.len() {
            return Err(Error::MatrixMismatch { catalog: catalog.len(), matrix: matrix.len() });
        }

        let q = self.embed_query(query)?;
        if q.len() != matrix.dim() {
            return Err(Error::EmbeddingComputation(format!(
                "query vector has dimension {}, matrix has {}",
                q.len(),
                matrix.dim()
            )));
        }
        let results = rank_by_vector(&q, matrix, top_k.min(catalog.len()));
        debug!(query, hits = results.len(), top = results.first().map(|r| r.score), "ranked catalog");
        Ok(results)
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(|e| Error::EmbeddingComputation(format!("{:#}", e)))?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            n => Err(Error::EmbeddingComputation(format!("provider returned {} vectors for one query", n))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6, "Identical vectors should have similarity 1.0");
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6, "Orthogonal vectors should have similarity 0.0");
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0]);
        assert!((sim + 1.0).abs() < 1e-6, "Opposite vectors should have similarity -1.0");
    }

    #[test]
    fn zero_vector_similarity_is_exactly_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[3.0, 4.0]), 0.0);
        assert_eq!(cosine_similarity(&[3.0, 4.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn magnitude_does_not_change_similarity() {
        let short = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        let long = cosine_similarity(&[100.0, 100.0], &[1.0, 0.0]);
        assert!((short - long).abs() < 1e-6);
    }

    #[test]
    fn similarity_stays_in_bounds_for_extreme_values() {
        let big = [f32::MAX, f32::MAX, -f32::MAX];
        let tiny = [f32::MIN_POSITIVE, 0.0, f32::MIN_POSITIVE];
        for (a, b) in [(&big, &big), (&big, &tiny), (&tiny, &tiny)] {
            let s = cosine_similarity(a, b);
            assert!((-1.0..=1.0).contains(&s), "{s}");
        }
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn rank_by_vector_orders_and_clamps() {
        let matrix = EmbeddingMatrix::try_new(3, vec![
            vec![0.0, 1.0, 0.0], // idx 0: similarity 0.0
            vec![1.0, 0.0, 0.0], // idx 1: similarity 1.0
            vec![0.7, 0.7, 0.0], // idx 2: similarity ~0.7
        ]).unwrap();
        let hits = rank_by_vector(&[1.0, 0.0, 0.0], &matrix, 2);
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
    }

    #[test]
    fn equal_scores_keep_catalog_order() {
        let matrix = EmbeddingMatrix::try_new(2, vec![
            vec![0.0, 1.0],
            vec![2.0, 0.0],
            vec![0.0, 0.0],
            vec![5.0, 0.0],
            vec![0.0, -3.0],
            vec![1.0, 0.0],
        ]).unwrap();
        let hits = rank_by_vector(&[1.0, 0.0], &matrix, 10);
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 3, 5, 0, 2, 4]);
    }
}
