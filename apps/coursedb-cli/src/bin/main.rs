use std::env;
use std::io::{self, BufRead, Write};

use coursedb_cli::{init_tracing, load_catalog, open_index, open_store, render_results, split_query_limit, Paths};
use coursedb_core::config::Config;
use coursedb_core::traits::Embedder;
use coursedb_core::Error;

const HELP: &str = "\
Type what you would like to learn, e.g. 'beginner friendly machine learning courses'.
  <query> [-n N]   search, showing at most N courses
  /stats           catalog and embedding details
  /help            this message
  /quit            exit";

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut paths = Paths::from_settings(config.settings());
    let mut i = 0;
    while i < args.len() {
        if !paths.try_flag(&args, &mut i)? {
            eprintln!("Usage: coursedb [--catalog PATH] [--cache PATH]");
            std::process::exit(2);
        }
        i += 1;
    }
    let default_limit = config.settings().search.top_k;

    // Model and matrix are built once here and live until exit.
    let catalog = load_catalog(&paths.catalog)?;
    let store = open_store(config.settings(), &paths.cache)?;
    let index = open_index(catalog, &store)?;

    println!("🎓 Course Search\n================\n{}", HELP);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("\n> ");
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/stats" => {
                println!("Courses:   {}", index.catalog().len());
                println!("Vectors:   {} x {}", index.matrix().len(), index.matrix().dim());
                println!("Provider:  {}", store.embedder().embedder_id());
                println!("Catalog:   {}", paths.catalog.display());
                println!("Cache:     {}", store.cache_path().display());
            }
            cmd if cmd.starts_with('/') => eprintln!("Unknown command {}; try /help", cmd),
            input => {
                let (query, limit) = match split_query_limit(input) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        eprintln!("⚠️  {}", e);
                        continue;
                    }
                };
                match index.search(&query, limit.unwrap_or(default_limit)) {
                    Ok(hits) => render_results(&mut stdout.lock(), &query, &hits)?,
                    Err(Error::InvalidQuery(msg)) => eprintln!("⚠️  {}", msg),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(())
}
