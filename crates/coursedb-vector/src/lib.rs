//! Embedding store and cosine retrieval for the course catalog.
//!
//! [`EmbeddingStore`] turns the catalog into an embedding matrix once and
//! keeps a durable copy (see `cache`); [`RetrievalEngine`] ranks records
//! against a query. [`CourseIndex`] bundles a loaded catalog with its
//! matrix for the binaries.
use std::sync::Arc;

use coursedb_core::error::Result;
use coursedb_core::traits::{Embedder, SearchEngine};
use coursedb_core::types::{Catalog, CourseRecord, EmbeddingMatrix, ScoredResult};

pub mod cache;
pub mod search;
pub mod store;

pub use search::{cosine_similarity, rank_by_vector, RetrievalEngine, DEFAULT_TOP_K};
pub use store::{CacheStatus, EmbeddingStore, LoadReport, MatrixSource};

/// A catalog paired with its resident matrix, ready to answer queries.
pub struct CourseIndex {
    catalog: Arc<Catalog>,
    matrix: Arc<EmbeddingMatrix>,
    engine: RetrievalEngine,
}

impl CourseIndex {
    /// Load (or build) the matrix for `catalog` through `store`.
    pub fn open(catalog: Arc<Catalog>, store: &EmbeddingStore) -> Result<(Self, LoadReport)> {
        let report = store.load_with_report(&catalog)?;
        let index = Self::from_parts(catalog, Arc::clone(&report.matrix), Arc::clone(store.embedder()));
        Ok((index, report))
    }

    pub fn from_parts(catalog: Arc<Catalog>, matrix: Arc<EmbeddingMatrix>, embedder: Arc<dyn Embedder>) -> Self {
        Self { catalog, matrix, engine: RetrievalEngine::new(embedder) }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn matrix(&self) -> &EmbeddingMatrix {
        &self.matrix
    }

    /// Ranked hits joined with their records.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<(ScoredResult, &CourseRecord)>> {
        let hits = self.engine.search(query, &self.catalog, &self.matrix, top_k)?;
        Ok(hits.into_iter().filter_map(|h| self.catalog.get(h.index).map(|r| (h, r))).collect())
    }
}

impl SearchEngine for CourseIndex {
    fn query(&self, query: &str, k: usize) -> Result<Vec<ScoredResult>> {
        self.engine.search(query, &self.catalog, &self.matrix, k)
    }
}
