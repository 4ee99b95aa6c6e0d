// Detector Batch CLI
// create / edit / delete event detectors from CSV, plus schema, template and export helpers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use detector_batch::{
    export_edit_csv, record_batch_run, run_batch, template_header, DigestReader, Operation,
    RunConfig, SqliteStore,
};
use detector_batch::store::ENTITY_DETECTOR;

const DEFAULT_DB: &str = "detectors.db";

#[derive(Parser)]
#[command(name = "detector-batch")]
#[command(author, version, about = "CSV batch reconciler for event detectors", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema, optionally seeding data points and handlers
    Init {
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
        /// JSON fixture with data points, handlers and detectors
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Create event detectors from a CSV file
    Create(RunArgs),

    /// Edit existing event detectors from a CSV file
    Edit(RunArgs),

    /// Delete event detectors listed in a CSV file
    Delete(RunArgs),

    /// Print the header row a job expects
    Template {
        job: Operation,
        #[arg(long, default_value_t = ',')]
        delimiter: char,
    },

    /// Write every detector as a ready-to-edit CSV
    Export {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the audit trail of one detector
    History {
        xid: String,
        #[arg(long, default_value = DEFAULT_DB)]
        db: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// CSV input file
    #[arg(short, long)]
    input: PathBuf,

    /// JSON run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_DB)]
    db: PathBuf,

    /// Validate and plan every record without committing
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { db, seed } => run_init(&db, seed.as_deref()),
        Commands::Create(args) => run_job(Operation::Create, args),
        Commands::Edit(args) => run_job(Operation::Edit, args),
        Commands::Delete(args) => run_job(Operation::Delete, args),
        Commands::Template { job, delimiter } => {
            println!("{}", template_header(job, delimiter));
            Ok(())
        }
        Commands::Export { output, db, config } => run_export(&output, &db, config.as_deref()),
        Commands::History { xid, db } => run_history(&xid, &db),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let config = match path {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    Ok(config)
}

fn run_init(db: &Path, seed: Option<&Path>) -> Result<()> {
    println!("🔧 Setting up database {}...", db.display());
    let store = SqliteStore::open(db)?;
    println!("✓ Schema ready (WAL mode)");

    if let Some(seed) = seed {
        let counts = store
            .seed_from_file(seed)
            .with_context(|| format!("seeding from {}", seed.display()))?;
        println!(
            "✓ Seeded {} data points, {} event handlers, {} event detectors",
            counts.data_points, counts.event_handlers, counts.event_detectors
        );
    }
    Ok(())
}

fn run_job(operation: Operation, args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.dry_run {
        config.dry_run = true;
    }

    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("opening database {}", args.db.display()))?;
    let file = File::open(&args.input)
        .with_context(|| format!("opening input {}", args.input.display()))?;

    let mut reader = DigestReader::new(BufReader::new(file));
    let summary = run_batch(&mut reader, operation, &config, &store)?;
    let digest = reader.finish();
    info!(input = %args.input.display(), digest = %digest, "Input digest");

    record_batch_run(&store, operation, &digest, &summary)?;

    println!("{}", summary.final_line());
    Ok(())
}

fn run_export(output: &Path, db: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let store = SqliteStore::open(db)?;
    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;

    let rows = export_edit_csv(&store, BufWriter::new(file), &config)?;
    println!("✓ Exported {} event detectors to {}", rows, output.display());
    Ok(())
}

fn run_history(xid: &str, db: &Path) -> Result<()> {
    let store = SqliteStore::open(db)?;
    let events = store.events_for(ENTITY_DETECTOR, xid)?;

    if events.is_empty() {
        println!("No audit events for {}", xid);
        return Ok(());
    }

    println!("📜 History of {} ({} events)", xid, events.len());
    for event in events {
        println!(
            "{}  {:<20} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            event.data
        );
    }
    Ok(())
}
