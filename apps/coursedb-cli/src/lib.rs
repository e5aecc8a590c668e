//! Plumbing shared by the coursedb binaries: logging setup, path overrides,
//! provider/store wiring and result rendering.
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coursedb_core::catalog::CatalogLoader;
use coursedb_core::config::Settings;
use coursedb_core::traits::Embedder;
use coursedb_core::types::{Catalog, CourseRecord, ScoredResult};
use coursedb_embed::get_default_embedder;
use coursedb_vector::{CourseIndex, EmbeddingStore, LoadReport, MatrixSource};

/// Logs go to stderr so stdout carries only results. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();
}

/// Catalog and cache locations after command-line overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    pub catalog: PathBuf,
    pub cache: PathBuf,
}

impl Paths {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { catalog: settings.catalog.resolved_path(), cache: settings.cache.resolved_path() }
    }

    /// Consume `--catalog PATH` / `--cache PATH` at `args[*i]`. Returns false
    /// for any other argument.
    pub fn try_flag(&mut self, args: &[String], i: &mut usize) -> anyhow::Result<bool> {
        let slot = match args[*i].as_str() {
            "--catalog" => &mut self.catalog,
            "--cache" => &mut self.cache,
            _ => return Ok(false),
        };
        *slot = PathBuf::from(flag_value(args, i)?);
        Ok(true)
    }
}

/// Value following the flag at `args[*i]`; advances `i` past it.
pub fn flag_value<'a>(args: &'a [String], i: &mut usize) -> anyhow::Result<&'a str> {
    let flag = &args[*i];
    let value = args.get(*i + 1).ok_or_else(|| anyhow!("{} requires a value", flag))?;
    *i += 1;
    Ok(value)
}

pub fn parse_limit(value: &str) -> anyhow::Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("limit must be a positive number, got '{}'", value)),
    }
}

/// A one-shot search request from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub paths: Paths,
    pub query: String,
    pub limit: usize,
}

/// Parse `<query words> [--limit N] [--catalog PATH] [--cache PATH]`, flags in
/// any position. Returns `None` when no query text remains, so callers can
/// stop before loading the catalog or touching the cache.
pub fn parse_search_args(args: &[String], paths: Paths, limit: usize) -> anyhow::Result<Option<SearchRequest>> {
    let mut request = SearchRequest { paths, query: String::new(), limit };
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if !request.paths.try_flag(args, &mut i)? {
            match args[i].as_str() {
                "--limit" | "-n" => request.limit = parse_limit(flag_value(args, &mut i)?)?,
                word => words.push(word),
            }
        }
        i += 1;
    }
    request.query = words.join(" ").trim().to_string();
    if request.query.is_empty() {
        return Ok(None);
    }
    Ok(Some(request))
}

/// Split an interactive line `<query> [-n N]` into the query and optional limit.
pub fn split_query_limit(line: &str) -> anyhow::Result<(String, Option<usize>)> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [query @ .., "-n", n] => Ok((query.join(" "), Some(parse_limit(n)?))),
        [.., "-n"] => Err(anyhow!("-n requires a value")),
        _ => Ok((words.join(" "), None)),
    }
}

pub fn load_catalog(path: &Path) -> anyhow::Result<Arc<Catalog>> {
    let catalog = CatalogLoader::new().load(path).with_context(|| format!("loading catalog from {}", path.display()))?;
    Ok(Arc::new(catalog))
}

/// Provider from `settings.embedding`, wrapped in a store over `cache`.
pub fn open_store(settings: &Settings, cache: &Path) -> anyhow::Result<EmbeddingStore> {
    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&settings.embedding)?);
    info!(embedder = embedder.embedder_id(), cache = %cache.display(), "opening embedding store");
    Ok(EmbeddingStore::new(embedder, cache))
}

/// Load or build the matrix and report how it was obtained on stderr.
pub fn open_index(catalog: Arc<Catalog>, store: &EmbeddingStore) -> anyhow::Result<CourseIndex> {
    let (index, report) = CourseIndex::open(catalog, store)?;
    eprintln!("{}", describe_load(&report, store.cache_path()));
    Ok(index)
}

pub fn describe_load(report: &LoadReport, cache: &Path) -> String {
    let how = match report.source {
        MatrixSource::Memory => "already in memory".to_string(),
        MatrixSource::Cache => format!("loaded from {}", cache.display()),
        MatrixSource::Built if report.warnings.is_empty() => format!("built and saved to {}", cache.display()),
        MatrixSource::Built => "built (cache not saved)".to_string(),
    };
    format!("📚 {} courses, {}-dim embeddings {}", report.matrix.len(), report.matrix.dim(), how)
}

pub fn relevance_percent(score: f32) -> f32 {
    score * 100.0
}

pub fn render_hit(out: &mut impl Write, hit: &ScoredResult, record: &CourseRecord) -> io::Result<()> {
    writeln!(out, "\n  {}. 📘 {} (Relevance: {:.2}%)", hit.rank, record.title, relevance_percent(hit.score))?;
    if !record.description.is_empty() {
        writeln!(out, "     {}", record.description)?;
    }
    if let Some(curriculum) = &record.curriculum {
        writeln!(out, "     Curriculum: {}", curriculum)?;
    }
    if let Some(duration) = &record.duration {
        writeln!(out, "     ⏱️  Duration: {}", duration)?;
    }
    if let Some(level) = &record.level {
        writeln!(out, "     📊 Level: {}", level)?;
    }
    if let Some(link) = &record.course_link {
        writeln!(out, "     🔗 {}", link)?;
    }
    Ok(())
}

pub fn render_results(out: &mut impl Write, query: &str, hits: &[(ScoredResult, &CourseRecord)]) -> io::Result<()> {
    if hits.is_empty() {
        writeln!(out, "No courses found matching \"{}\". Try different keywords.", query)?;
        return Ok(());
    }
    writeln!(out, "🔍 Found {} relevant courses for: \"{}\"", hits.len(), query)?;
    for (hit, record) in hits {
        render_hit(out, hit, record)?;
    }
    Ok(())
}
