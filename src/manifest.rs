//! Chunk manifest parsing.
//!
//! A chunk manifest is a line-oriented text log describing how a large file
//! set was partitioned into numbered chunks:
//!
//! ```text
//! Chunk #1 (2 files, 1.5MB):
//! - assets/a.bin
//! - assets/b.bin
//! Chunk #2 (1 files, 0.3MB):
//! - docs/readme.pdf
//! ```
//!
//! Parsing is a two-state machine (outside a chunk / inside a chunk) over an
//! explicit tokenizer. Lines that match neither the header nor the file-line
//! shape are ignored, so malformed headers degrade to plain text instead of
//! raising a structural error. An empty result is a valid outcome the caller
//! must check for.

use std::fmt;

// ---------------------------------------------------------------------------
// ChunkRecord
// ---------------------------------------------------------------------------

/// One chunk as declared by the manifest.
///
/// Created once during parsing and immutable afterwards. The declared file
/// count and size are carried through to commit messages and logs as-is; they
/// are *not* verified against `files.len()` — a mismatch is descriptive noise
/// in the source manifest, not an error.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    /// Chunk number from the header. Unique within a well-formed manifest,
    /// but not necessarily contiguous, and duplicates are not rejected here.
    pub number: u64,
    /// File count as stated in the header line.
    pub declared_file_count: u64,
    /// Size in megabytes as stated in the header line. Descriptive only.
    pub declared_size_mb: f64,
    /// Repository-relative paths, in manifest order. Order determines
    /// staging order but has no effect on the resulting commit.
    pub files: Vec<String>,
}

impl ChunkRecord {
    /// The commit message generated for this chunk.
    ///
    /// The literal shape `Chunk #<N> - <count> files pushed successfully` is
    /// load-bearing: downstream tooling greps history for it. Do not reword.
    #[must_use]
    pub fn commit_message(&self) -> String {
        format!(
            "Chunk #{} - {} files pushed successfully",
            self.number, self.declared_file_count
        )
    }
}

impl fmt::Display for ChunkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chunk #{} ({} files, {}MB)",
            self.number, self.declared_file_count, self.declared_size_mb
        )
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a chunk manifest into an ordered list of chunk records.
///
/// Chunks appear in header order; no sorting or renumbering. Duplicate chunk
/// numbers are kept as separate records (the replay engine's processed-set
/// check means only the first ever runs). A chunk still open at end of input
/// is emitted as the final record.
///
/// Never fails: unrecognized lines are skipped, and a manifest with no
/// recognizable headers parses to an empty list.
#[must_use]
pub fn parse(text: &str) -> Vec<ChunkRecord> {
    let mut chunks = Vec::new();
    let mut open: Option<ChunkRecord> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(header) = parse_header(trimmed) {
            if let Some(done) = open.take() {
                chunks.push(done);
            }
            open = Some(header);
        } else if let Some(chunk) = open.as_mut()
            && let Some(path) = parse_file_line(trimmed)
        {
            chunk.files.push(path.to_owned());
        }
    }

    if let Some(done) = open {
        chunks.push(done);
    }
    chunks
}

/// Recognize a header line: `Chunk #<int> (<int> files, <decimal>MB):`.
///
/// Matching is prefix-based — trailing text after the colon is tolerated,
/// the same way the manifests in the wild carry annotations there. Any
/// deviation earlier in the line (wrong field types, missing `MB`) makes the
/// line ordinary text.
fn parse_header(line: &str) -> Option<ChunkRecord> {
    let rest = line.strip_prefix("Chunk #")?;
    let (number, rest) = take_integer(rest)?;
    let rest = rest.strip_prefix(" (")?;
    let (declared_file_count, rest) = take_integer(rest)?;
    let rest = rest.strip_prefix(" files, ")?;
    let (declared_size_mb, rest) = take_decimal(rest)?;
    rest.strip_prefix("MB):")?;

    Some(ChunkRecord {
        number,
        declared_file_count,
        declared_size_mb,
        files: Vec::new(),
    })
}

/// Recognize a file line: trimmed line starting with `- `. The path is the
/// second whitespace-delimited token, i.e. the token right after the dash.
///
/// Paths with embedded whitespace are therefore unsupported — that is the
/// contract of this format, not an accident. A dash with no token after it
/// yields nothing.
fn parse_file_line(line: &str) -> Option<&str> {
    if !line.starts_with("- ") {
        return None;
    }
    line.split_whitespace().nth(1)
}

/// Split a leading run of ASCII digits off `s` and parse it.
fn take_integer(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// Split a leading run of digits and dots off `s` and parse it as a decimal.
/// A run that is not a valid number (e.g. `1.2.3`) rejects the line.
fn take_decimal(s: &str) -> Option<(f64, &str)> {
    let end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
