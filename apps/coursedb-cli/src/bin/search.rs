use std::env;
use std::io;

use coursedb_cli::{init_tracing, load_catalog, open_index, open_store, parse_search_args, render_results, Paths};
use coursedb_core::config::Config;

const USAGE: &str = "Usage: coursedb-search <query> [--limit N] [--catalog PATH] [--cache PATH]";

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let args: Vec<String> = env::args().skip(1).collect();
    let paths = Paths::from_settings(config.settings());

    // Blank queries stop here, before the catalog is read or the cache written.
    let Some(request) = parse_search_args(&args, paths, config.settings().search.top_k)? else {
        eprintln!("{}", USAGE);
        eprintln!("Example: coursedb-search 'beginner friendly machine learning courses' --limit 5");
        std::process::exit(1);
    };

    let catalog = load_catalog(&request.paths.catalog)?;
    let store = open_store(config.settings(), &request.paths.cache)?;
    let index = open_index(catalog, &store)?;
    let hits = index.search(&request.query, request.limit)?;
    render_results(&mut io::stdout().lock(), &request.query, &hits)?;
    Ok(())
}
