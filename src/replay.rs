//! The resumable replay engine.
//!
//! Consumes parsed chunk records in manifest order and drives the VCS
//! gateway per chunk: stage every listed file, commit with the generated
//! message, push, then record the chunk in the ledger. Strictly sequential —
//! each VCS call mutates shared repository state (index, history) with no
//! concurrent-access semantics, so nothing here is safe to parallelize.
//!
//! # Failure policy
//!
//! All gateway failures are absorbed at the chunk boundary: the chunk is
//! marked failed and the run moves on. Nothing is retried within a run; the
//! only retry mechanism is re-running the whole replay, where the ledger
//! check skips everything that already completed. The one deliberate
//! inconsistency: a chunk whose commit succeeded but whose push failed is
//! *not* recorded — the local commit exists, and the next run's re-commit
//! fails harmlessly with nothing staged.

use std::fmt;

use tracing::{error, info, warn};

use crate::git::{CmdOutcome, StageOutcome, Vcs};
use crate::ledger::{ChunkLedger, LedgerError};
use crate::manifest::ChunkRecord;

// ---------------------------------------------------------------------------
// ChunkStatus
// ---------------------------------------------------------------------------

/// Terminal state of one chunk within a run.
///
/// Every chunk moves from pending to exactly one of these; there are no
/// intra-run retries, so all five are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkStatus {
    /// Already in the ledger; no VCS operation was performed.
    Skipped,
    /// Staging a file that exists on disk failed; commit never attempted.
    StageFailed,
    /// The commit command failed.
    CommitFailed,
    /// The push command failed. The local commit exists but the chunk is
    /// deliberately not recorded as processed.
    PushFailed,
    /// Stage, commit, and push all succeeded and the ledger was updated.
    Succeeded,
}

impl ChunkStatus {
    /// Whether this status counts as a failure in the run summary.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::StageFailed | Self::CommitFailed | Self::PushFailed)
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::StageFailed => write!(f, "stage-failed"),
            Self::CommitFailed => write!(f, "commit-failed"),
            Self::PushFailed => write!(f, "push-failed"),
            Self::Succeeded => write!(f, "succeeded"),
        }
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Per-chunk outcome, in input order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// The chunk number from the manifest.
    pub number: u64,
    /// Terminal status for this run.
    pub status: ChunkStatus,
}

/// What happened across one replay run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One outcome per input chunk, in input order.
    pub outcomes: Vec<ChunkOutcome>,
}

impl RunSummary {
    /// Total chunks seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Chunks that completed stage + commit + push this run.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(ChunkStatus::Succeeded)
    }

    /// Chunks skipped because the ledger already had them.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(ChunkStatus::Skipped)
    }

    /// Chunks that failed at any stage.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_failure()).count()
    }

    fn count(&self, status: ChunkStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} succeeded, {} skipped, {} failed",
            self.total(),
            self.succeeded(),
            self.skipped(),
            self.failed()
        )
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Injected progress sink.
///
/// The engine emits structured per-chunk events through this seam instead of
/// writing to process-wide log state; the default [`TracingReporter`]
/// forwards to `tracing`, tests record events in a `Vec`.
pub trait Reporter {
    /// A chunk is about to be replayed.
    fn chunk_started(&mut self, chunk: &ChunkRecord) {
        let _ = chunk;
    }

    /// A chunk was skipped because the ledger already had it.
    fn chunk_skipped(&mut self, number: u64) {
        let _ = number;
    }

    /// A listed file was absent on disk and staging moved past it.
    fn missing_file(&mut self, number: u64, path: &str) {
        let _ = (number, path);
    }

    /// A chunk reached its terminal status. `detail` carries the failing
    /// command's output when there is one.
    fn chunk_finished(&mut self, number: u64, status: ChunkStatus, detail: Option<&str>) {
        let _ = (number, status, detail);
    }
}

/// Default reporter: structured `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn chunk_started(&mut self, chunk: &ChunkRecord) {
        info!(
            chunk = chunk.number,
            files = chunk.declared_file_count,
            size_mb = chunk.declared_size_mb,
            "processing chunk"
        );
    }

    fn chunk_skipped(&mut self, number: u64) {
        info!(chunk = number, "already processed, skipping");
    }

    fn missing_file(&mut self, number: u64, path: &str) {
        warn!(chunk = number, path, "file not found, skipping");
    }

    fn chunk_finished(&mut self, number: u64, status: ChunkStatus, detail: Option<&str>) {
        match status {
            ChunkStatus::Succeeded => info!(chunk = number, "chunk pushed and recorded"),
            ChunkStatus::Skipped => {}
            _ => error!(
                chunk = number,
                status = %status,
                detail = detail.unwrap_or(""),
                "chunk failed"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Replay `chunks` against `vcs`, consulting and updating `ledger`.
///
/// Per chunk, in input order:
/// 1. in the ledger → skipped, no VCS calls;
/// 2. stage every file (missing file → warn and continue; git failure on an
///    existing file → stage-failed, commit never attempted);
/// 3. commit with the chunk's generated message; failure → commit-failed;
/// 4. push; failure → push-failed, chunk not recorded;
/// 5. record the chunk number durably, then mark succeeded.
///
/// # Errors
/// Only a ledger write failure is fatal: after a successful push, failing to
/// persist the one piece of durable state is not something the next chunk
/// should run past.
pub fn replay<V: Vcs, R: Reporter>(
    chunks: &[ChunkRecord],
    ledger: &mut ChunkLedger,
    vcs: &mut V,
    reporter: &mut R,
) -> Result<RunSummary, LedgerError> {
    let mut summary = RunSummary::default();

    for chunk in chunks {
        let status = replay_one(chunk, ledger, vcs, reporter)?;
        summary.outcomes.push(ChunkOutcome {
            number: chunk.number,
            status,
        });
    }

    Ok(summary)
}

fn replay_one<V: Vcs, R: Reporter>(
    chunk: &ChunkRecord,
    ledger: &mut ChunkLedger,
    vcs: &mut V,
    reporter: &mut R,
) -> Result<ChunkStatus, LedgerError> {
    if ledger.contains(chunk.number) {
        reporter.chunk_skipped(chunk.number);
        return Ok(ChunkStatus::Skipped);
    }

    reporter.chunk_started(chunk);

    for file in &chunk.files {
        match vcs.stage(file) {
            StageOutcome::Staged => {}
            StageOutcome::Missing => reporter.missing_file(chunk.number, file),
            StageOutcome::Failed { detail } => {
                reporter.chunk_finished(chunk.number, ChunkStatus::StageFailed, Some(&detail));
                return Ok(ChunkStatus::StageFailed);
            }
        }
    }

    if let CmdOutcome::Failed { detail } = vcs.commit(&chunk.commit_message()) {
        reporter.chunk_finished(chunk.number, ChunkStatus::CommitFailed, Some(&detail));
        return Ok(ChunkStatus::CommitFailed);
    }

    if let CmdOutcome::Failed { detail } = vcs.push() {
        // The commit exists locally. Deliberately not recorded: the next run
        // re-stages, the re-commit fails with nothing staged, and the push
        // gets another attempt.
        reporter.chunk_finished(chunk.number, ChunkStatus::PushFailed, Some(&detail));
        return Ok(ChunkStatus::PushFailed);
    }

    ledger.record(chunk.number)?;
    reporter.chunk_finished(chunk.number, ChunkStatus::Succeeded, None);
    Ok(ChunkStatus::Succeeded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
