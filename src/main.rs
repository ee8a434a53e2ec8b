use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tunebook::config::AppConfig;
use tunebook::db::models::{StoredTune, TuneFilter};
use tunebook::db::Database;
use tunebook::display::{self, Column};
use tunebook::loader::{self, LoadOptions};
use tunebook::shell::{QueryShell, ShellOptions};

#[derive(Parser)]
#[command(name = "tunebook", version, about = "ABC tune-book loader and explorer")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Runs the interactive menu when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct OutputArgs {
    /// Print matching tunes as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every book under ROOT and store the tunes
    Load {
        /// Folder holding numbered book folders (defaults to config abc_root)
        root: Option<PathBuf>,

        /// Delete existing tunes before inserting
        #[arg(long)]
        clear: bool,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Show the first tunes in load order
    List {
        /// Number of results (defaults to config list_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Search titles (case-insensitive substring match)
    Search {
        title: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show tunes from one book
    Book {
        number: String,

        /// Number of results (defaults to config filter_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Filter by tune type, e.g. jig or reel (substring match)
    Type {
        tune_type: String,

        /// Number of results (defaults to config filter_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Filter by key signature (substring match)
    Key {
        key: String,

        /// Number of results (defaults to config filter_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show corpus statistics
    Stats,

    /// Interactive menu
    Shell {
        /// Folder holding numbered book folders (defaults to config abc_root)
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(tunebook::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = Database::open(&db_path).context("Failed to open database")?;

    let list_limit = config.display.list_limit;
    let filter_limit = config.display.filter_limit;

    match cli.command {
        None => run_shell(&db, &config, None)?,

        Some(Commands::Shell { root }) => run_shell(&db, &config, root)?,

        Some(Commands::Load { root, clear, jobs }) => {
            let root = root.unwrap_or_else(|| config.abc_root.clone());
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let opts = LoadOptions {
                clear_existing: clear,
                workers,
                cancel: None,
            };

            let result = loader::load_books(&db, &root, &opts).context("Load failed")?;
            if result.files_found == 0 {
                println!("No files found under {}", root.display());
                return Ok(());
            }
            if result.cleared > 0 {
                println!("Cleared {} existing tunes", result.cleared);
            }
            println!(
                "Load complete: {} files found, {} failed, {} tunes parsed, {} inserted, {} insert errors",
                result.files_found,
                result.files_failed,
                result.tunes_parsed,
                result.tunes_inserted,
                result.insert_errors
            );
        }

        Some(Commands::List { limit, output }) => {
            let tunes = db
                .query_tunes(&TuneFilter::All, Some(limit.unwrap_or(list_limit)))
                .context("Query failed")?;
            if !output.json {
                println!("Total tunes: {}", db.count_tunes().context("Query failed")?);
                println!();
            }
            print_tunes(&tunes, display::LIST_COLUMNS, output.json)?;
        }

        Some(Commands::Search { title, output }) => {
            let tunes = db
                .query_tunes(&TuneFilter::TitleContains(title), None)
                .context("Query failed")?;
            print_tunes(&tunes, display::SEARCH_COLUMNS, output.json)?;
        }

        Some(Commands::Book { number, limit, output }) => {
            let tunes = db
                .query_tunes(&TuneFilter::Book(number), Some(limit.unwrap_or(filter_limit)))
                .context("Query failed")?;
            print_tunes(&tunes, display::BOOK_COLUMNS, output.json)?;
        }

        Some(Commands::Type { tune_type, limit, output }) => {
            let tunes = db
                .query_tunes(
                    &TuneFilter::TypeContains(tune_type),
                    Some(limit.unwrap_or(filter_limit)),
                )
                .context("Query failed")?;
            print_tunes(&tunes, display::TYPE_COLUMNS, output.json)?;
        }

        Some(Commands::Key { key, limit, output }) => {
            let tunes = db
                .query_tunes(&TuneFilter::KeyContains(key), Some(limit.unwrap_or(filter_limit)))
                .context("Query failed")?;
            print_tunes(&tunes, display::KEY_COLUMNS, output.json)?;
        }

        Some(Commands::Stats) => {
            let stats = db.stats().context("Failed to get stats")?;
            display::write_stats(&mut io::stdout().lock(), &stats)?;
        }
    }

    Ok(())
}

fn run_shell(db: &Database, config: &AppConfig, root: Option<PathBuf>) -> Result<()> {
    let opts = ShellOptions {
        abc_root: root.unwrap_or_else(|| config.abc_root.clone()),
        workers: config.resolve_workers(),
        list_limit: config.display.list_limit,
        filter_limit: config.display.filter_limit,
    };
    let stdin = io::stdin();
    QueryShell::new(db, opts, stdin.lock(), io::stdout()).run()
}

/// Print query results as a table or JSON array.
fn print_tunes(tunes: &[StoredTune], columns: &[Column], json: bool) -> Result<()> {
    let mut out = io::stdout().lock();

    if json {
        serde_json::to_writer_pretty(&mut out, tunes).context("Failed to write JSON")?;
        writeln!(out)?;
        return Ok(());
    }

    if tunes.is_empty() {
        writeln!(out, "No results found.")?;
        return Ok(());
    }

    writeln!(out, "Found {} tunes:", tunes.len())?;
    writeln!(out)?;
    display::write_tune_table(&mut out, tunes, columns)?;
    Ok(())
}
