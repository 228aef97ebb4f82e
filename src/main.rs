use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use sdvault::config::{default_extensions, IngestConfig};
use sdvault::core::models::{ConflictPolicy, DedupMethod, OrganizeStrategy};
use sdvault::core::Pipeline;
use sdvault::core::ProgressEvent;
use sdvault::logging::{self, LogConfig};

#[derive(Parser)]
#[command(name = "sdvault")]
#[command(about = "Ingest photos and videos from removable media into a date-organized archive", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingest pass from source to destination.
    Run(RunArgs),
    /// Print the version string.
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Source tree to scan (SD card mount or staging directory)
    #[arg(long)]
    source: PathBuf,

    /// Destination archive root
    #[arg(long)]
    dest: PathBuf,

    /// Extensions to ingest (lowercase, no dot); defaults to common photo/video types
    #[arg(long = "ext", value_name = "EXT")]
    include_extensions: Vec<String>,

    /// Parallel copy workers
    #[arg(long)]
    jobs: Option<usize>,

    /// Duplicate detection method
    #[arg(long, value_enum, default_value = "name-size")]
    dedup: DedupMethod,

    /// What to do when the destination path is already occupied
    #[arg(long, value_enum, default_value = "skip")]
    conflict: ConflictPolicy,

    /// Destination layout strategy
    #[arg(long, value_enum, default_value = "date")]
    organize: OrganizeStrategy,

    /// Event name appended to event-strategy folders
    #[arg(long, default_value = "")]
    event_name: String,

    /// Directory (under dest) for files without a capture time
    #[arg(long, default_value = "unclassified")]
    unclassified_dir: String,

    /// Directory (under dest) for quarantined conflicts
    #[arg(long, default_value = "quarantine")]
    quarantine_dir: String,

    /// Resume-state file location
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Run log file location
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the run log as JSON lines instead of text
    #[arg(long)]
    log_json: bool,

    /// Plan and report without touching the filesystem
    #[arg(long)]
    dry_run: bool,

    /// Verify each completed copy (size + content hash)
    #[arg(long)]
    hash_verify: bool,

    /// Skip resume-state consults and saves
    #[arg(long)]
    ignore_state: bool,

    /// Inclusive start of the capture-date window (YYYY-MM-DD)
    #[arg(long, default_value = "")]
    date_from: String,

    /// Inclusive end of the capture-date window (YYYY-MM-DD)
    #[arg(long, default_value = "")]
    date_to: String,

    /// Verbose diagnostics
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("sdvault {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> ExitCode {
    logging::init(LogConfig {
        json: false,
        verbose: args.verbose,
    });

    let defaults = IngestConfig::default();
    let mut cfg = IngestConfig {
        source: args.source,
        dest: args.dest,
        include_extensions: if args.include_extensions.is_empty() {
            default_extensions()
        } else {
            args.include_extensions
        },
        jobs: args.jobs.unwrap_or(defaults.jobs),
        dedup_method: args.dedup,
        conflict_policy: args.conflict,
        organize_strategy: args.organize,
        event_name: args.event_name,
        unclassified_dir: args.unclassified_dir,
        quarantine_dir: args.quarantine_dir,
        state_file: args.state_file.unwrap_or(defaults.state_file),
        log_file: args.log_file.unwrap_or(defaults.log_file),
        log_json: args.log_json,
        dry_run: args.dry_run,
        hash_verify: args.hash_verify,
        ignore_state: args.ignore_state,
        date_filter_start: args.date_from,
        date_filter_end: args.date_to,
    };

    if let Err(e) = cfg.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let mut pipeline = match Pipeline::new(cfg).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            render_event(&ProgressEvent::Error {
                error: format!("{e:#}"),
            });
            return ExitCode::FAILURE;
        }
    };
    pipeline.subscribe(Arc::new(|event| render_event(&event)));

    match pipeline.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            render_event(&ProgressEvent::Error {
                error: format!("{e:#}"),
            });
            ExitCode::FAILURE
        }
    }
}

/// Console rendering for pipeline progress.
fn render_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::Status { message } => println!("{message}"),
        ProgressEvent::AnalysisProgress { current, total, .. } => {
            print!("\ranalyzing [{current}/{total}]");
            let _ = std::io::stdout().flush();
            if current == total {
                println!();
            }
        }
        ProgressEvent::Progress {
            current,
            total,
            filename,
            action,
        } => {
            println!("[{current}/{total}] {action}: {filename}");
        }
        // The summary block is printed by the run log sink.
        ProgressEvent::Complete { .. } => {}
        ProgressEvent::Error { error } => eprintln!("error: {error}"),
    }
}
