use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};

use resilient_cache::config::{load_config, CoreConfig};
use resilient_cache::observability::logging::init_logging;
use resilient_cache::PersistentCache;

#[derive(Parser)]
#[command(name = "cache-cli")]
#[command(about = "Inspect and maintain a persistent cache directory", long_about = None)]
struct Cli {
    /// TOML config file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache directory, overrides `persistent.directory` from the config
    #[arg(short, long)]
    dir: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Entry count and hit statistics
    Stats,
    /// Print the value stored under a key
    Get { key: String },
    /// Remove a key
    Delete { key: String },
    /// List every entry with its age and TTL
    Inspect,
    /// Remove expired entries
    Cleanup,
    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CoreConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    init_logging(&config.observability)?;

    let cache = match cli.dir {
        Some(dir) => PersistentCache::open(
            dir,
            Duration::from_secs(config.persistent.default_ttl_secs),
        )?,
        None => PersistentCache::from_config(&config.persistent)?,
    };

    match cli.command {
        Commands::Stats => print_json(&cache.stats().await)?,
        Commands::Get { key } => match cache.get::<Value>(&key).await {
            Some(value) => print_json(&value)?,
            None => {
                eprintln!("No live entry for '{}'", key);
                std::process::exit(1);
            }
        },
        Commands::Delete { key } => {
            cache.delete(&key).await;
            print_json(&json!({ "deleted": key }))?;
        }
        Commands::Inspect => print_json(&cache.inspect().await)?,
        Commands::Cleanup => {
            let removed = cache.cleanup_expired().await;
            print_json(&json!({ "removed": removed }))?;
        }
        Commands::Clear => {
            let removed = cache.clear().await;
            print_json(&json!({ "removed": removed }))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
