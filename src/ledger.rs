//! Processed-chunk ledger.
//!
//! The ledger is the durable set of chunk numbers that completed the full
//! stage + commit + push cycle in some run. It is the only state that
//! survives a crash: re-running a replay consults the ledger to skip chunks
//! that are already on the remote.
//!
//! On disk it is a JSON array of integers (`[1, 2, 5]`), rewritten in full on
//! every insertion. Every write is atomic (write-to-temp + fsync + rename) so
//! a crash never leaves a half-written file. The only tolerated inconsistency
//! is a crash *between* a successful push and the ledger write — the in-flight
//! chunk is lost and will be retried on the next run, where its commit
//! harmlessly fails with nothing staged.
//!
//! Single-writer only: concurrent runs against the same ledger are not
//! supported and must be prevented by the operator.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Conventional ledger filename, kept inside the target repository so the
/// resumable state lives beside the history it describes.
pub const DEFAULT_LEDGER_FILE: &str = "processed-chunks.json";

// ---------------------------------------------------------------------------
// ChunkLedger
// ---------------------------------------------------------------------------

/// Durable set of successfully replayed chunk numbers.
#[derive(Debug)]
pub struct ChunkLedger {
    path: PathBuf,
    processed: BTreeSet<u64>,
}

impl ChunkLedger {
    /// Load the ledger from `path`.
    ///
    /// A missing file is an empty ledger (first run). A file that exists but
    /// cannot be deserialized into a set of integers is
    /// [`LedgerError::Corrupt`] — deliberately fatal rather than treated as
    /// empty, because an empty ledger would re-commit chunks that are already
    /// pushed.
    ///
    /// # Errors
    /// Returns [`LedgerError::Corrupt`] for undeserializable content and
    /// [`LedgerError::Io`] for any read failure other than "not found".
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let processed = match fs::read_to_string(&path) {
            Ok(contents) => {
                let numbers: Vec<u64> =
                    serde_json::from_str(&contents).map_err(|e| LedgerError::Corrupt {
                        path: path.clone(),
                        detail: e.to_string(),
                    })?;
                numbers.into_iter().collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                return Err(LedgerError::Io(format!("read {}: {e}", path.display())));
            }
        };
        Ok(Self { path, processed })
    }

    /// Whether `number` completed a full replay cycle in some run.
    #[must_use]
    pub fn contains(&self, number: u64) -> bool {
        self.processed.contains(&number)
    }

    /// Record `number` as fully replayed, durably, before returning.
    ///
    /// The whole set is rewritten atomically: serialize, write to a temp file
    /// in the same directory, fsync, rename over the target. A subsequent
    /// [`ChunkLedger::load`] — including after a process restart — sees the
    /// insertion.
    ///
    /// # Errors
    /// Returns [`LedgerError`] on serialization or I/O failure; the in-memory
    /// set is only updated once the file is durable.
    pub fn record(&mut self, number: u64) -> Result<(), LedgerError> {
        let mut updated = self.processed.clone();
        updated.insert(number);

        let numbers: Vec<u64> = updated.iter().copied().collect();
        let json = serde_json::to_string(&numbers)
            .map_err(|e| LedgerError::Serialize(e.to_string()))?;

        let dir = self.path.parent().ok_or_else(|| {
            LedgerError::Io(format!("no parent directory for {}", self.path.display()))
        })?;

        // Write to a temporary file in the same directory (same filesystem,
        // so the rename below is atomic).
        let tmp_path = dir.join(".chunk-ledger.tmp");
        let mut file = fs::File::create(&tmp_path)
            .map_err(|e| LedgerError::Io(format!("create {}: {e}", tmp_path.display())))?;
        file.write_all(json.as_bytes())
            .map_err(|e| LedgerError::Io(format!("write {}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| LedgerError::Io(format!("fsync {}: {e}", tmp_path.display())))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            LedgerError::Io(format!(
                "rename {} → {}: {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })?;

        self.processed = updated;
        Ok(())
    }

    /// The recorded chunk numbers, ascending.
    pub fn processed(&self) -> impl Iterator<Item = u64> + '_ {
        self.processed.iter().copied()
    }

    /// Number of recorded chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The conventional ledger path inside a repository.
    #[must_use]
    pub fn default_path(repo_root: &Path) -> PathBuf {
        repo_root.join(DEFAULT_LEDGER_FILE)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from ledger operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    /// The backing file exists but does not deserialize to a set of integers.
    Corrupt {
        /// Path to the ledger file.
        path: PathBuf,
        /// Deserialization failure detail.
        detail: String,
    },
    /// Serialization error.
    Serialize(String),
    /// I/O error (not "not found").
    Io(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt { path, detail } => {
                write!(
                    f,
                    "processed-chunk ledger '{}' is corrupt: {detail}\n  \
                     Refusing to continue: treating a corrupt ledger as empty would \
                     re-commit chunks that are already pushed.\n  \
                     To fix: restore the file, or delete it to deliberately replay everything.",
                    path.display()
                )
            }
            Self::Serialize(msg) => write!(f, "ledger serialize error: {msg}"),
            Self::Io(msg) => write!(f, "ledger I/O error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
