//! Durable embedding cache: the whole matrix as one JSON blob.
//!
//! Reads never fail the caller. Anything short of a well-formed file that
//! matches the current provider and catalog size is reported as a miss, and
//! the store rebuilds. Writes go to a temporary file in the same directory and
//! are renamed over the target, so readers never observe a partial matrix.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use coursedb_core::error::{Error, Result};
use coursedb_core::types::EmbeddingMatrix;

pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub format_version: u32,
    pub embedder_id: String,
    pub dim: usize,
    pub rows: usize,
    pub built_at: DateTime<Utc>,
    pub vectors: Vec<Vec<f32>>,
}

impl CacheFile {
    pub fn new(embedder_id: &str, matrix: &EmbeddingMatrix) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            embedder_id: embedder_id.to_string(),
            dim: matrix.dim(),
            rows: matrix.len(),
            built_at: Utc::now(),
            vectors: matrix.rows().map(<[f32]>::to_vec).collect(),
        }
    }
}

/// What a read attempt found on disk.
#[derive(Debug)]
pub enum CacheRead {
    Missing,
    /// Present but not readable or not parseable. Always a
    /// [`Error::CachePersistence`].
    Unreadable(Error),
    Loaded(CacheFile),
}

/// Why a well-formed cache file cannot serve the current catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheRejection {
    #[error("cache format v{found}, expected v{expected}")]
    FormatVersion { found: u32, expected: u32 },
    #[error("cache built by '{found}', current provider is '{expected}'")]
    Embedder { found: String, expected: String },
    #[error("cache dimension {found}, provider dimension {expected}")]
    Dimension { found: usize, expected: usize },
    #[error("cache holds {found} rows, catalog has {expected} records")]
    RowCount { found: usize, expected: usize },
    #[error("cache row {row} has length {len}, expected {dim}")]
    RaggedRow { row: usize, len: usize, dim: usize },
    #[error("cache row {row} contains a non-finite value")]
    NonFinite { row: usize },
}

pub fn read(path: &Path) -> CacheRead {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return CacheRead::Missing,
        Err(e) => {
            return CacheRead::Unreadable(Error::CachePersistence(format!(
                "failed to open {}: {}",
                path.display(),
                e
            )))
        }
    };
    match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
        Ok(cache) => CacheRead::Loaded(cache),
        Err(e) => CacheRead::Unreadable(Error::CachePersistence(format!("corrupt cache {}: {}", path.display(), e))),
    }
}

/// Accept `cache` for a catalog of `expected_rows` records embedded by
/// `embedder_id` at dimension `dim`, or say why not.
pub fn validate(
    cache: CacheFile,
    expected_rows: usize,
    embedder_id: &str,
    dim: usize,
) -> std::result::Result<EmbeddingMatrix, CacheRejection> {
    if cache.format_version != CACHE_FORMAT_VERSION {
        return Err(CacheRejection::FormatVersion { found: cache.format_version, expected: CACHE_FORMAT_VERSION });
    }
    if cache.embedder_id != embedder_id {
        return Err(CacheRejection::Embedder { found: cache.embedder_id, expected: embedder_id.to_string() });
    }
    if cache.dim != dim {
        return Err(CacheRejection::Dimension { found: cache.dim, expected: dim });
    }
    if cache.vectors.len() != expected_rows {
        return Err(CacheRejection::RowCount { found: cache.vectors.len(), expected: expected_rows });
    }
    if let Some(row) = cache.vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(CacheRejection::NonFinite { row });
    }
    EmbeddingMatrix::try_new(dim, cache.vectors).map_err(|(row, len)| CacheRejection::RaggedRow { row, len, dim })
}

/// Atomically replace the cache file at `path`.
pub fn write(path: &Path, cache: &CacheFile) -> Result<()> {
    let persist_err = |what: &str, e: &dyn std::fmt::Display| {
        Error::CachePersistence(format!("failed to {} {}: {}", what, path.display(), e))
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| persist_err("create directory for", &e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| persist_err("stage", &e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, cache).map_err(|e| persist_err("serialize", &e))?;
        writer.flush().map_err(|e| persist_err("write", &e))?;
    }
    tmp.as_file().sync_all().map_err(|e| persist_err("sync", &e))?;
    tmp.persist(path).map_err(|e| persist_err("persist", &e.error))?;
    debug!(path = %path.display(), rows = cache.rows, "wrote embedding cache");
    Ok(())
}

/// Delete the cache file. Returns whether a file was removed.
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::CachePersistence(format!("failed to remove {}: {}", path.display(), e))),
    }
}
