//! Command-line front end for the sharded store.
//!
//! Every command opens the store, performs one operation through the
//! library API and prints the result as text or JSON.

use clap::{Parser, Subcommand, ValueEnum};
use shard_store::logging::init_logging;
use shard_store::{
    parse_key, ConflictPolicy, Error, ShardId, ShardRecord, ShardRouter, ShardStoreConfig,
    ShardedStore,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::Level;

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "shard-cli")]
#[command(about = "Sharded key-value store", version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage root directory
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Number of shards (must match the existing store)
    #[arg(short = 'n', long, global = true)]
    shards: Option<u32>,

    /// Behavior when inserting an existing key (replace, fail)
    #[arg(long, global = true)]
    on_conflict: Option<String>,

    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert or replace a record
    Insert {
        key: String,
        value: String,
    },

    /// Retrieve the value for a key
    Get { key: String },

    /// Delete a key
    Delete { key: String },

    /// List records, optionally from a single shard
    Scan {
        #[arg(short, long)]
        shard: Option<u32>,
    },

    /// Show which shard owns a key
    Route { key: String },

    /// Show per-shard statistics
    Stats,

    /// Rewrite shard files without dead records
    Compact,

    /// Interactive insert/retrieve/delete/show loop
    Shell,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.json_logs);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(e.as_ref()));
    }
}

/// Store errors exit with the magnitude of their `error_code` so scripts can
/// tell, for example, a locked root (2) from an unreadable shard (3).
fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(e) => e.error_code().abs(),
        None => 1,
    }
}

fn load_config(cli: &Cli) -> CliResult<ShardStoreConfig> {
    let mut config = match &cli.config {
        Some(path) => ShardStoreConfig::from_file(path)?,
        None => ShardStoreConfig::default(),
    }
    .with_env_overrides()?;

    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(shards) = cli.shards {
        config.shard_count = shards;
    }
    if let Some(policy) = &cli.on_conflict {
        config.on_conflict = policy.parse::<ConflictPolicy>()?;
    }
    Ok(config)
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli)?;
    let store = ShardedStore::open(config)?;
    let json = cli.format == OutputFormat::Json;

    match cli.command {
        Commands::Insert { key, value } => {
            let key = parse_key(&key)?;
            let shard = store.insert(key, &value)?;
            if json {
                print_json(&serde_json::json!({ "key": key, "shard": shard }))?;
            } else {
                println!("Inserted key={} into {}", key, shard);
            }
        }
        Commands::Get { key } => {
            let key = parse_key(&key)?;
            let value = store.get(key)?;
            if json {
                print_json(&serde_json::json!({
                    "key": key,
                    "shard": store.shard_for(key),
                    "value": value,
                }))?;
            } else {
                match value {
                    Some(value) => println!("{}", value),
                    None => println!("Data not found"),
                }
            }
        }
        Commands::Delete { key } => {
            let key = parse_key(&key)?;
            let removed = store.delete(key)?;
            if json {
                print_json(&serde_json::json!({
                    "key": key,
                    "shard": store.shard_for(key),
                    "removed": removed,
                }))?;
            } else {
                println!("Deleted key={} from {}", key, store.shard_for(key));
            }
        }
        Commands::Scan { shard } => {
            let records: Vec<ShardRecord> = match shard {
                Some(n) => store
                    .scan_shard(ShardId::new(n))?
                    .into_iter()
                    .map(|r| ShardRecord {
                        shard: ShardId::new(n),
                        key: r.key,
                        value: r.value,
                    })
                    .collect(),
                None => store.scan_all()?,
            };
            if json {
                print_json(&records)?;
            } else {
                let mut out = io::stdout().lock();
                print_records(&store, &records, shard.map(ShardId::new), &mut out)?;
            }
        }
        Commands::Route { key } => {
            let key = parse_key(&key)?;
            let shard = store.router().route(key);
            if json {
                print_json(&serde_json::json!({ "key": key, "shard": shard }))?;
            } else {
                println!("{}", shard);
            }
        }
        Commands::Stats => {
            let stats = store.stats();
            if json {
                print_json(&stats)?;
            } else {
                println!(
                    "{:<10} {:>8} {:>12} {:>12} {:>8} {:>8} {:>8}",
                    "shard", "records", "file_bytes", "garbage", "inserts", "gets", "deletes"
                );
                for s in &stats.shards {
                    println!(
                        "{:<10} {:>8} {:>12} {:>12} {:>8} {:>8} {:>8}",
                        s.shard.to_string(),
                        s.records,
                        s.file_bytes,
                        s.garbage_bytes,
                        s.inserts,
                        s.gets,
                        s.deletes
                    );
                }
                println!("total records: {}", stats.total_records());
            }
        }
        Commands::Compact => {
            store.compact_all()?;
            if json {
                print_json(&store.stats())?;
            } else {
                println!("Compacted {} shards", store.shard_count());
            }
        }
        Commands::Shell => {
            let stdin = io::stdin();
            let mut out = io::stdout().lock();
            run_shell(&store, stdin.lock(), &mut out)?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print records grouped by shard, listing empty shards too.
fn print_records<W: Write>(
    store: &ShardedStore,
    records: &[ShardRecord],
    only: Option<ShardId>,
    out: &mut W,
) -> io::Result<()> {
    let shards: Vec<ShardId> = match only {
        Some(shard) => vec![shard],
        None => store.shard_ids().collect(),
    };
    for shard in shards {
        let mut rows = records.iter().filter(|r| r.shard == shard).peekable();
        if rows.peek().is_none() {
            writeln!(out, "\n{} is empty.", shard)?;
            continue;
        }
        writeln!(out, "\nData in {}:", shard)?;
        for row in rows {
            writeln!(out, "  Key: {}, Value: {}", row.key, row.value)?;
        }
    }
    Ok(())
}

fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, text: &str) -> io::Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Interactive loop. Invalid keys are reported and the loop continues;
/// storage errors are reported per command.
fn run_shell<R: BufRead, W: Write>(store: &ShardedStore, mut input: R, out: &mut W) -> io::Result<()> {
    loop {
        let Some(choice) = prompt(
            &mut input,
            out,
            "Do you want to (i)nsert, (r)etrieve, (d)elete, (s)how data, or (q)uit? ",
        )?
        else {
            return Ok(());
        };

        let result: shard_store::Result<()> = match choice.trim().to_lowercase().as_str() {
            "i" => {
                let Some(raw) = prompt(&mut input, out, "Enter the key (integer): ")? else {
                    return Ok(());
                };
                match parse_key(&raw) {
                    Ok(key) => {
                        let Some(value) = prompt(&mut input, out, "Enter the value: ")? else {
                            return Ok(());
                        };
                        store.insert(key, &value).and_then(|shard| {
                            writeln!(out, "Inserted key={} into {}", key, shard)?;
                            Ok(())
                        })
                    }
                    Err(e) => Err(e),
                }
            }
            "r" => {
                let Some(raw) = prompt(&mut input, out, "Enter the key (integer) to retrieve: ")? else {
                    return Ok(());
                };
                parse_key(&raw).and_then(|key| {
                    let value = store.get(key)?;
                    writeln!(
                        out,
                        "Retrieved data for key={}: {}",
                        key,
                        value.as_deref().unwrap_or("Data not found")
                    )?;
                    Ok(())
                })
            }
            "d" => {
                let Some(raw) = prompt(&mut input, out, "Enter the key (integer) to delete: ")? else {
                    return Ok(());
                };
                parse_key(&raw).and_then(|key| {
                    store.delete(key)?;
                    writeln!(out, "Deleted key={} from {}", key, store.shard_for(key))?;
                    Ok(())
                })
            }
            "s" => store.scan_all().and_then(|records| {
                print_records(store, &records, None, out)?;
                Ok(())
            }),
            "q" => {
                writeln!(out, "Exiting...")?;
                return Ok(());
            }
            _ => {
                writeln!(out, "Invalid choice. Please enter 'i', 'r', 'd', 's' or 'q'.")?;
                Ok(())
            }
        };

        match result {
            Ok(()) => {}
            Err(Error::InvalidInput(_)) => {
                writeln!(out, "Invalid input. Please enter a valid integer for the key.")?
            }
            Err(e) if e.is_retryable() => writeln!(out, "Error: {} (try again)", e)?,
            Err(e) => writeln!(out, "Error: {}", e)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn shell(store: &ShardedStore, script: &str) -> String {
        let mut out = Vec::new();
        run_shell(store, script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_shell_session() {
        let dir = tempdir().unwrap();
        let store = ShardedStore::open_at(dir.path(), 3).unwrap();

        let output = shell(&store, "i\n1\nUserA\nr\n1\nd\n1\nr\n1\nq\n");
        assert!(output.contains("Inserted key=1 into shard_2"));
        assert!(output.contains("Retrieved data for key=1: UserA"));
        assert!(output.contains("Deleted key=1 from shard_2"));
        assert!(output.contains("Retrieved data for key=1: Data not found"));
        assert!(output.ends_with("Exiting...\n"));
    }

    #[test]
    fn test_shell_rejects_bad_key_and_continues() {
        let dir = tempdir().unwrap();
        let store = ShardedStore::open_at(dir.path(), 3).unwrap();

        let output = shell(&store, "i\nabc\nx\ni\n3\nUserC\n");
        assert!(output.contains("Invalid input"));
        assert!(output.contains("Invalid choice"));
        assert_eq!(store.get(3).unwrap().as_deref(), Some("UserC"));
    }

    #[test]
    fn test_shell_show_lists_empty_shards() {
        let dir = tempdir().unwrap();
        let store = ShardedStore::open_at(dir.path(), 3).unwrap();
        store.insert(3, "UserC").unwrap();

        let output = shell(&store, "s\n");
        assert!(output.contains("Data in shard_1:\n  Key: 3, Value: UserC"));
        assert!(output.contains("shard_2 is empty."));
        assert!(output.contains("shard_3 is empty."));
    }

    #[test]
    fn test_exit_code_follows_store_error() {
        let config: Box<dyn std::error::Error> = Box::new(Error::Config("locked".into()));
        assert_eq!(exit_code(config.as_ref()), 2);

        let unavailable: Box<dyn std::error::Error> = Box::new(Error::StorageUnavailable {
            shard: ShardId::new(1),
            reason: "read-only".into(),
        });
        assert_eq!(exit_code(unavailable.as_ref()), 3);

        let other: Box<dyn std::error::Error> = "bad flag".into();
        assert_eq!(exit_code(other.as_ref()), 1);
    }

    #[test]
    fn test_shell_reports_duplicate_key() {
        let dir = tempdir().unwrap();
        let config = ShardStoreConfig::new(dir.path(), 3)
            .with_conflict_policy(ConflictPolicy::Fail);
        let store = ShardedStore::open(config).unwrap();
        store.insert(1, "UserA").unwrap();

        let output = shell(&store, "i\n1\nUserB\n");
        assert!(output.contains("Error: Key 1 already exists in shard_2"));
        assert!(!output.contains("try again"));
        assert_eq!(store.get(1).unwrap().as_deref(), Some("UserA"));
    }
}
