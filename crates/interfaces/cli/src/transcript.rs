//! Conversation transcripts for `paravault extract`.
//!
//! One JSON object per line: `{"role": "user" | "assistant" | "system",
//! "content": "..."}`.  Extra fields (timestamps and the like) are ignored.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use paravault_memory::Turn;

/// Load every well-formed turn from `path`.  Blank and undecodable lines are
/// skipped with a warning.
pub(crate) fn load_turns(path: &Path) -> Result<Vec<Turn>> {
    let file = fs::File::open(path).with_context(|| format!("open transcript {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut turns = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read transcript {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Turn>(&line) {
            Ok(turn) => turns.push(turn),
            Err(err) => warn!(line = index + 1, %err, "skipping malformed transcript line"),
        }
    }
    Ok(turns)
}
