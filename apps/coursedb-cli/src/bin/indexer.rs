use std::env;

use coursedb_cli::{describe_load, init_tracing, load_catalog, open_store, Paths};
use coursedb_core::config::Config;
use coursedb_core::traits::Embedder;
use coursedb_vector::{CacheStatus, MatrixSource};

const USAGE: &str = "Usage: coursedb-index [--catalog PATH] [--cache PATH] [--rebuild] [--status]";

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut paths = Paths::from_settings(config.settings());
    let (mut rebuild, mut status_only) = (false, false);
    let mut i = 0;
    while i < args.len() {
        if !paths.try_flag(&args, &mut i)? {
            match args[i].as_str() {
                "--rebuild" | "-r" => rebuild = true,
                "--status" | "-s" => status_only = true,
                "--help" | "-h" => {
                    println!("{}", USAGE);
                    return Ok(());
                }
                other => {
                    eprintln!("Unknown argument: {}\n{}", other, USAGE);
                    std::process::exit(2);
                }
            }
        }
        i += 1;
    }

    println!("Course Embedding Indexer\n========================");
    println!("Catalog: {}", paths.catalog.display());
    println!("Cache:   {}", paths.cache.display());

    let catalog = load_catalog(&paths.catalog)?;
    let store = open_store(config.settings(), &paths.cache)?;
    println!("Provider: {} (dim {})", store.embedder().embedder_id(), store.embedder().dim());

    if status_only {
        match store.status(&catalog) {
            CacheStatus::Missing => println!("❌ No cache on disk; run without --status to build it"),
            CacheStatus::Unreadable(e) => println!("⚠️  Cache unreadable: {}", e),
            CacheStatus::Stale { reason, built_at } => {
                println!("⚠️  Cache built {} is stale: {}", built_at.to_rfc3339(), reason)
            }
            CacheStatus::Fresh { rows, dim, embedder_id, built_at } => println!(
                "✅ Cache is current: {} rows x {} dims by {} (built {})",
                rows,
                dim,
                embedder_id,
                built_at.to_rfc3339()
            ),
        }
        return Ok(());
    }

    if rebuild {
        println!("🗑️  Discarding existing embeddings (--rebuild)");
        store.invalidate()?;
    }
    let report = store.load_with_report(&catalog)?;
    for warning in &report.warnings {
        eprintln!("⚠️  {}", warning);
    }
    println!("\n✅ {}", describe_load(&report, store.cache_path()));
    if report.source == MatrixSource::Built && !report.warnings.is_empty() {
        // The matrix is usable but the next run will have to embed again.
        std::process::exit(1);
    }
    println!("\n💡 To search, use: cargo run --bin coursedb-search '<query>'");
    Ok(())
}
