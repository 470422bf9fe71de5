use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chunkpush::git::GitRepo;
use chunkpush::ledger::ChunkLedger;
use chunkpush::manifest::{self, ChunkRecord};
use chunkpush::replay::{self, TracingReporter};

/// Replay a chunked file manifest as git commits
///
/// chunkpush reads a chunk manifest — the log a file-set splitter leaves
/// behind, one `Chunk #N (C files, SMB):` header per chunk followed by
/// `- path` lines — and replays it against a git repository: stage the
/// chunk's files, commit with a generated message, push, move to the next
/// chunk.
///
/// Runs are resumable. Every fully pushed chunk is recorded in a ledger
/// file (default: processed-chunks.json inside the repo); re-running after
/// an interruption skips everything already recorded. Failed chunks are
/// never retried within a run — re-run to retry them.
///
/// QUICK START:
///
///   chunkpush plan upload.log
///   chunkpush run upload.log /path/to/repo
///   # interrupted? just run it again:
///   chunkpush run upload.log /path/to/repo
#[derive(Parser)]
#[command(name = "chunkpush")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'chunkpush <command> --help' for more on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the manifest against a repository
    Run(RunArgs),

    /// Parse the manifest and list its chunks without touching git
    Plan(PlanArgs),

    /// Show which chunks are already processed and which are pending
    Status(StatusArgs),
}

/// Replay the manifest against a repository.
#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the chunk manifest log
    manifest: PathBuf,

    /// Path to the git repository to replay into
    repo: PathBuf,

    /// Ledger file recording processed chunks
    /// (default: <repo>/processed-chunks.json)
    #[arg(long)]
    ledger: Option<PathBuf>,
}

/// Parse and list chunks; no git operations.
#[derive(Args, Debug)]
struct PlanArgs {
    /// Path to the chunk manifest log
    manifest: PathBuf,
}

/// Cross-reference the manifest against the ledger.
#[derive(Args, Debug)]
struct StatusArgs {
    /// Path to the chunk manifest log
    manifest: PathBuf,

    /// Path to the git repository the ledger lives in
    repo: PathBuf,

    /// Ledger file recording processed chunks
    /// (default: <repo>/processed-chunks.json)
    #[arg(long)]
    ledger: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(ref args) => run_replay(args),
        Commands::Plan(ref args) => run_plan(args),
        Commands::Status(ref args) => run_status(args),
    }
}

/// Structured logs to stderr; `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read and parse the manifest. Unreadable input is fatal before any chunk
/// is touched.
fn load_chunks(manifest: &Path) -> Result<Vec<ChunkRecord>> {
    let text = fs::read_to_string(manifest)
        .with_context(|| format!("Failed to read manifest '{}'", manifest.display()))?;
    Ok(manifest::parse(&text))
}

fn run_replay(args: &RunArgs) -> Result<()> {
    let chunks = load_chunks(&args.manifest)?;
    if chunks.is_empty() {
        // Distinct, non-fatal condition: the run never starts.
        warn!(
            manifest = %args.manifest.display(),
            "no chunks found in manifest; nothing to replay"
        );
        return Ok(());
    }

    let mut repo = GitRepo::open(args.repo.clone())?;
    let ledger_path = args
        .ledger
        .clone()
        .unwrap_or_else(|| ChunkLedger::default_path(repo.root()));
    let mut ledger = ChunkLedger::load(ledger_path)?;

    info!(
        chunks = chunks.len(),
        already_processed = ledger.len(),
        repo = %repo.root().display(),
        "starting replay"
    );

    let summary = replay::replay(&chunks, &mut ledger, &mut repo, &mut TracingReporter)?;

    println!("Replay complete: {summary}");
    if summary.failed() > 0 {
        for outcome in summary.outcomes.iter().filter(|o| o.status.is_failure()) {
            println!("  failed: Chunk #{} ({})", outcome.number, outcome.status);
        }
        bail!(
            "{} chunk(s) failed; re-run the same command to retry them",
            summary.failed()
        );
    }
    Ok(())
}

fn run_plan(args: &PlanArgs) -> Result<()> {
    let chunks = load_chunks(&args.manifest)?;
    if chunks.is_empty() {
        println!(
            "No chunks found in '{}'.\n  \
             Expected blocks like:\n    Chunk #1 (2 files, 1.5MB):\n    - path/to/file",
            args.manifest.display()
        );
        return Ok(());
    }

    let mut listed = 0usize;
    for chunk in &chunks {
        println!("{chunk}");
        for file in &chunk.files {
            println!("  - {file}");
        }
        listed += chunk.files.len();
    }
    println!("{} chunk(s), {listed} listed file(s)", chunks.len());
    Ok(())
}

fn run_status(args: &StatusArgs) -> Result<()> {
    let chunks = load_chunks(&args.manifest)?;
    let repo = GitRepo::open(args.repo.clone())?;
    let ledger_path = args
        .ledger
        .clone()
        .unwrap_or_else(|| ChunkLedger::default_path(repo.root()));
    let ledger = ChunkLedger::load(ledger_path)?;

    let (processed, pending): (Vec<&ChunkRecord>, Vec<&ChunkRecord>) =
        chunks.iter().partition(|c| ledger.contains(c.number));

    println!("Ledger: {}", ledger.path().display());
    println!("Processed ({}):", processed.len());
    for chunk in &processed {
        println!("  {chunk}");
    }
    println!("Pending ({}):", pending.len());
    for chunk in &pending {
        println!("  {chunk}");
    }
    Ok(())
}
