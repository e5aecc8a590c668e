//! Loads the course catalog written by the scraping pipeline.
//!
//! Accepts a JSON array file, a JSON Lines file (`.jsonl`), or a directory of
//! such files. Directory entries are visited in sorted path order so the
//! resulting record order, and with it every record's identity, is stable
//! across runs.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Catalog, CourseRecord};

#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogLoader;

impl CatalogLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a non-empty catalog from `path`.
    pub fn load(&self, path: &Path) -> Result<Catalog> {
        if !path.exists() {
            return Err(Error::DataUnavailable(format!("catalog not found at {}", path.display())));
        }
        let files = if path.is_dir() { self.list_catalog_files(path) } else { vec![path.to_path_buf()] };
        if files.is_empty() {
            return Err(Error::DataUnavailable(format!("no .json/.jsonl files under {}", path.display())));
        }

        let mut records = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            let parsed = self.read_records(file_path)?;
            debug!(
                file = %file_path.display(),
                records = parsed.len(),
                "read catalog file {}/{}",
                file_index + 1,
                files.len()
            );
            records.extend(parsed);
        }
        if records.is_empty() {
            return Err(Error::DataUnavailable(format!("catalog at {} has no records", path.display())));
        }
        info!(records = records.len(), files = files.len(), "loaded course catalog");
        Ok(Catalog::new(records))
    }

    fn read_records(&self, file_path: &Path) -> Result<Vec<CourseRecord>> {
        let content = fs::read_to_string(file_path)
            .map_err(|e| Error::DataUnavailable(format!("failed to read {}: {}", file_path.display(), e)))?;
        if is_jsonl(file_path) {
            content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| {
                    serde_json::from_str(line).map_err(|e| {
                        let at = format!("{}:{}", file_path.display(), n + 1);
                        Error::DataUnavailable(format!("{}: invalid course record: {}", at, e))
                    })
                })
                .collect()
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::DataUnavailable(format!("{}: invalid course catalog: {}", file_path.display(), e)))
        }
    }

    fn list_catalog_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
            .collect();
        files.sort();
        files
    }
}

fn is_jsonl(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("jsonl")
}
