//! Embedding store: owns the catalog's embedding matrix and its durable copy.
//!
//! `load` is a two-phase contract. Phase one reads the persisted matrix and
//! validates it (format, provider, dimension, row count). Phase two, only on
//! a miss, embeds every record in one provider call, checks the result and
//! persists it. The in-memory matrix is built at most once per store; the
//! build runs under a mutex so concurrent callers wait for it instead of
//! starting their own. The resident matrix is reused only for a catalog with
//! the same embedding texts as the one it was built from.
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use coursedb_core::error::{Error, Result};
use coursedb_core::traits::Embedder;
use coursedb_core::types::{Catalog, EmbeddingMatrix};

use crate::cache::{self, CacheFile, CacheRead, CacheRejection};

/// Where the matrix returned by a load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixSource {
    /// Already resident in this store.
    Memory,
    /// Read from the persisted cache file.
    Cache,
    /// Computed by the embedding provider during this call.
    Built,
}

#[derive(Debug)]
pub struct LoadReport {
    pub matrix: Arc<EmbeddingMatrix>,
    pub source: MatrixSource,
    /// Recovered [`Error::CachePersistence`] failures.
    pub warnings: Vec<Error>,
}

/// State of the persisted cache relative to a catalog, without loading a model.
#[derive(Debug)]
pub enum CacheStatus {
    Missing,
    Unreadable(Error),
    Stale { reason: CacheRejection, built_at: DateTime<Utc> },
    Fresh { rows: usize, dim: usize, embedder_id: String, built_at: DateTime<Utc> },
}

struct Resident {
    fingerprint: u64,
    matrix: Arc<EmbeddingMatrix>,
}

pub struct EmbeddingStore {
    embedder: Arc<dyn Embedder>,
    cache_path: PathBuf,
    resident: Mutex<Option<Resident>>,
}

impl EmbeddingStore {
    pub fn new(embedder: Arc<dyn Embedder>, cache_path: impl Into<PathBuf>) -> Self {
        Self { embedder, cache_path: cache_path.into(), resident: Mutex::new(None) }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn load(&self, catalog: &Catalog) -> Result<Arc<EmbeddingMatrix>> {
        self.load_with_report(catalog).map(|report| report.matrix)
    }

    pub fn load_with_report(&self, catalog: &Catalog) -> Result<LoadReport> {
        if catalog.is_empty() {
            return Err(Error::DataUnavailable("catalog is empty".into()));
        }
        let fingerprint = catalog_fingerprint(catalog);
        let mut resident = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
        let mut skip_disk = false;
        if let Some(current) = resident.as_ref().filter(|r| r.matrix.len() == catalog.len()) {
            if current.fingerprint == fingerprint {
                let matrix = Arc::clone(&current.matrix);
                return Ok(LoadReport { matrix, source: MatrixSource::Memory, warnings: Vec::new() });
            }
            // The persisted copy holds the resident rows, which belong to other records.
            info!(rows = catalog.len(), "catalog records changed since last load; rebuilding");
            skip_disk = true;
        }

        let mut warnings = Vec::new();
        let persisted = if skip_disk { None } else { self.read_persisted(catalog.len(), &mut warnings) };
        let (matrix, source) = match persisted {
            Some(matrix) => {
                info!(rows = matrix.len(), path = %self.cache_path.display(), "loaded existing embeddings");
                (matrix, MatrixSource::Cache)
            }
            None => {
                let matrix = self.build(catalog)?;
                if let Err(e) = cache::write(&self.cache_path, &CacheFile::new(self.embedder.embedder_id(), &matrix)) {
                    warn!(error = %e, "embedding cache not saved; continuing with in-memory matrix");
                    warnings.push(e);
                }
                (matrix, MatrixSource::Built)
            }
        };

        let matrix = Arc::new(matrix);
        *resident = Some(Resident { fingerprint, matrix: Arc::clone(&matrix) });
        Ok(LoadReport { matrix, source, warnings })
    }

    /// Phase one. `None` means rebuild; read failures are pushed to `warnings`.
    fn read_persisted(&self, expected_rows: usize, warnings: &mut Vec<Error>) -> Option<EmbeddingMatrix> {
        match cache::read(&self.cache_path) {
            CacheRead::Missing => {
                debug!(path = %self.cache_path.display(), "no embedding cache on disk");
                None
            }
            CacheRead::Unreadable(e) => {
                warn!(error = %e, "ignoring unreadable embedding cache");
                warnings.push(e);
                None
            }
            CacheRead::Loaded(file) => {
                let expected_id = self.embedder.embedder_id();
                match cache::validate(file, expected_rows, expected_id, self.embedder.dim()) {
                    Ok(matrix) => Some(matrix),
                    Err(reason) => {
                        info!(%reason, "embedding cache is stale; rebuilding");
                        None
                    }
                }
            }
        }
    }

    /// Phase two: embed `title + " " + description` for every record in one call.
    fn build(&self, catalog: &Catalog) -> Result<EmbeddingMatrix> {
        let texts = catalog.embedding_texts();
        let dim = self.embedder.dim();
        info!(records = texts.len(), embedder = self.embedder.embedder_id(), "creating new embeddings");

        let rows = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| Error::EmbeddingComputation(format!("{:#}", e)))?;
        if rows.len() != texts.len() {
            return Err(Error::EmbeddingComputation(format!(
                "provider returned {} vectors for {} records",
                rows.len(),
                texts.len()
            )));
        }
        if let Some(row) = rows.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
            return Err(Error::EmbeddingComputation(format!("vector {} contains a non-finite value", row)));
        }
        EmbeddingMatrix::try_new(dim, rows).map_err(|(row, len)| {
            Error::EmbeddingComputation(format!("vector {} has dimension {}, expected {}", row, len, dim))
        })
    }

    /// Drop the resident matrix and delete the persisted copy.
    pub fn invalidate(&self) -> Result<()> {
        let mut resident = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
        *resident = None;
        if cache::remove(&self.cache_path)? {
            info!(path = %self.cache_path.display(), "removed embedding cache");
        }
        Ok(())
    }

    /// Describe the persisted cache against `catalog` without touching the provider.
    pub fn status(&self, catalog: &Catalog) -> CacheStatus {
        match cache::read(&self.cache_path) {
            CacheRead::Missing => CacheStatus::Missing,
            CacheRead::Unreadable(e) => CacheStatus::Unreadable(e),
            CacheRead::Loaded(file) => {
                let built_at = file.built_at;
                let embedder_id = file.embedder_id.clone();
                match cache::validate(file, catalog.len(), self.embedder.embedder_id(), self.embedder.dim()) {
                    Ok(matrix) => CacheStatus::Fresh { rows: matrix.len(), dim: matrix.dim(), embedder_id, built_at },
                    Err(reason) => CacheStatus::Stale { reason, built_at },
                }
            }
        }
    }
}

/// Order-sensitive hash of the catalog's embedding inputs.
fn catalog_fingerprint(catalog: &Catalog) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    for record in catalog {
        record.embedding_text().hash(&mut hasher);
    }
    hasher.finish()
}
