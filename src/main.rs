use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use thiserror::Error;

use global_cache::store::filenamify;
use global_cache::{DurableRecord, DurableStore, FsStore, StoreError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Key not found: {0}")]
    NotFound(String),
}

#[derive(Parser)]
#[command(name = "global-cache")]
#[command(about = "Inspect and maintain the durable records of a global cache")]
struct Cli {
    /// Directory holding the durable records
    #[arg(long, global = true, default_value = ".global-cache", env = "GLOBAL_CACHE_PATH")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored keys with their age and a value preview
    List {
        /// Only list keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Print the full record of a key as JSON
    Show {
        /// Cache key
        key: String,
    },

    /// Remove the record of a key
    Delete {
        /// Cache key
        key: String,
    },

    /// Remove records computed longer ago than a duration
    Prune {
        /// Maximum age to keep (e.g. "7d", "12h")
        #[arg(long, value_parser = humantime::parse_duration)]
        older_than: Duration,

        /// Report what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let store = FsStore::new(&cli.path);

    match cli.command {
        Commands::List { prefix } => {
            let prefix = prefix.unwrap_or_default();
            let records: Vec<DurableRecord> = store
                .list()
                .await?
                .into_iter()
                .filter(|r| r.key.starts_with(&prefix))
                .collect();
            if records.is_empty() {
                println!("No records in {}", cli.path.display());
            }
            let now = now_millis();
            for record in records {
                println!(
                    "{} ({}.json, {} ago): {}",
                    record.key,
                    filenamify(&record.key),
                    format_age(now, record.computed_at),
                    record.value.preview()
                );
            }
            Ok(())
        }
        Commands::Show { key } => {
            let record = store
                .load(&key)
                .await?
                .ok_or_else(|| AppError::NotFound(key.clone()))?;
            let mut body = serde_json::Map::new();
            body.insert("key".into(), record.key.into());
            body.insert("computedAt".into(), record.computed_at.into());
            body.insert("sig".into(), record.signature.into());
            if let Some(value) = record.value.to_json() {
                body.insert("value".into(), value);
            }
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Commands::Delete { key } => {
            if store.load(&key).await?.is_none() {
                return Err(AppError::NotFound(key));
            }
            store.delete(&key).await?;
            println!("Deleted '{}'", key);
            Ok(())
        }
        Commands::Prune {
            older_than,
            dry_run,
        } => {
            let now = now_millis();
            let max_age = u64::try_from(older_than.as_millis()).unwrap_or(u64::MAX);
            let mut pruned = 0usize;
            for record in store.list().await? {
                if now.saturating_sub(record.computed_at) <= max_age {
                    continue;
                }
                if !dry_run {
                    store.delete(&record.key).await?;
                }
                println!(
                    "{} '{}' ({} old)",
                    if dry_run { "Would remove" } else { "Removed" },
                    record.key,
                    format_age(now, record.computed_at)
                );
                pruned += 1;
            }
            println!("{} record(s) pruned", pruned);
            Ok(())
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Age rounded to whole seconds.
fn format_age(now: u64, computed_at: u64) -> String {
    let secs = now.saturating_sub(computed_at) / 1000;
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}
