//! Domain types shared by the embedding store and the retrieval engine.

use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder the scraping pipeline writes for fields it could not extract.
const MISSING_PLACEHOLDER: &str = "N/A";

/// One catalog entry as produced by the data-acquisition pipeline.
///
/// Identity is the record's position in its [`Catalog`]; the record itself
/// carries no id. Both snake_case keys and the scraper's column names
/// (`Title`, `Course Link`, ...) are accepted. Optional fields holding the
/// scraper's `"N/A"` placeholder, or nothing but whitespace, load as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(default, alias = "Title")]
    pub title: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    #[serde(default, alias = "Curriculum", deserialize_with = "optional_field")]
    pub curriculum: Option<String>,
    #[serde(default, alias = "Duration", deserialize_with = "optional_field")]
    pub duration: Option<String>,
    #[serde(default, alias = "Level", deserialize_with = "optional_field")]
    pub level: Option<String>,
    #[serde(
        default,
        alias = "courseLink",
        alias = "Course Link",
        deserialize_with = "optional_field"
    )]
    pub course_link: Option<String>,
}

impl CourseRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), ..Self::default() }
    }

    /// Text fed to the embedding provider: title and description joined by a
    /// single space, taken literally.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

fn optional_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && v != MISSING_PLACEHOLDER
    }))
}

/// Ordered, read-only sequence of course records.
///
/// Position `i` is the identity key of record `i` and must match row `i` of
/// the [`EmbeddingMatrix`] built from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<CourseRecord>,
}

impl Catalog {
    pub fn new(records: Vec<CourseRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CourseRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CourseRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    /// Embedding inputs in catalog order.
    pub fn embedding_texts(&self) -> Vec<String> {
        self.records.iter().map(CourseRecord::embedding_text).collect()
    }
}

impl From<Vec<CourseRecord>> for Catalog {
    fn from(records: Vec<CourseRecord>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CourseRecord;
    type IntoIter = std::slice::Iter<'a, CourseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// One vector per catalog record, same order as the catalog.
///
/// Rows all have length `dim`; constructors that take external data check it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    dim: usize,
    rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    /// Build a matrix, rejecting rows whose length differs from `dim`.
    pub fn try_new(dim: usize, rows: Vec<Vec<f32>>) -> Result<Self, (usize, usize)> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err((i, row.len()));
        }
        Ok(Self { dim, rows })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// A ranked hit: catalog index, raw cosine similarity and 1-based rank.
///
/// Created per query and discarded after presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub index: usize,
    pub score: f32,
    pub rank: usize,
}
