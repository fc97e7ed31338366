//! Fenced code-block extraction with backtracking.
//!
//! The model source arrives embedded in free chat text as a fenced Python
//! block declaring a `model()` entry point. A message can carry several
//! fenced blocks, and earlier ones may be malformed or unrelated; the scan
//! therefore backtracks past rejected blocks instead of failing on the
//! first invalid one.

use thiserror::Error;

use crate::error::StageError;

/// The entry-point declaration a candidate block must contain.
pub const ENTRY_POINT_MARKER: &str = "def model(";

/// Line that opens a Python fenced block.
const FENCE_OPENER: &str = "```python";

/// Line that closes a fenced block.
const FENCE_CLOSER: &str = "```";

/// An extracted model-code candidate.
///
/// Ephemeral: produced per extraction call and handed straight to the
/// render client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// The source text between the fences, without the fence lines.
    pub source: String,
}

/// Errors raised while scanning message content for model code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The message is non-empty but exhaustive scanning found no fenced
    /// block containing the entry point.
    #[error("no code block containing a `model()` function found in message")]
    NoCodeBlock,

    /// A fenced block opener exists with no closer after it.
    #[error("fenced code block is opened but never closed")]
    UnterminatedBlock,
}

impl StageError for ExtractError {
    fn code(&self) -> &'static str {
        match self {
            ExtractError::NoCodeBlock => "EXTRACT_001",
            ExtractError::UnterminatedBlock => "EXTRACT_002",
        }
    }

    fn category(&self) -> &'static str {
        "extract"
    }
}

/// Scans message content for a fenced Python block declaring `model()`.
///
/// Returns `Ok(None)` for empty content (nothing to extract). For non-empty
/// content the scan walks line ranges with a cursor: each round locates the
/// first opener and closer at or after the cursor, rejects candidates that
/// lack the entry-point marker, and resumes strictly after the rejected
/// region. A closer that precedes its opener marks a malformed region ending
/// at the opener line. Every round consumes at least one line, so the scan
/// is bounded by the line count.
pub fn extract_model_code(content: &str) -> Result<Option<CodeBlock>, ExtractError> {
    if content.is_empty() {
        return Ok(None);
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let mut cursor = 0;

    while cursor < lines.len() {
        let opener = position_from(&lines, cursor, FENCE_OPENER);
        let closer = position_from(&lines, cursor, FENCE_CLOSER);

        let (opener, closer) = match (opener, closer) {
            (Some(o), Some(c)) => (o, c),
            (Some(_), None) => return Err(ExtractError::UnterminatedBlock),
            (None, _) => return Err(ExtractError::NoCodeBlock),
        };

        if closer < opener {
            // Malformed nesting: the closer belongs to no opener, so the
            // malformed region ends at the opener line.
            cursor = opener + 1;
            continue;
        }

        let candidate = lines[opener + 1..closer].join("\n");
        if candidate.contains(ENTRY_POINT_MARKER) {
            return Ok(Some(CodeBlock { source: candidate }));
        }

        cursor = closer + 1;
    }

    Err(ExtractError::NoCodeBlock)
}

/// Index of the first line at or after `start` exactly equal to `needle`.
fn position_from(lines: &[&str], start: usize, needle: &str) -> Option<usize> {
    lines[start..]
        .iter()
        .position(|line| *line == needle)
        .map(|i| start + i)
}
