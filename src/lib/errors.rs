//! Custom error types for samsort operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for samsort operations
pub type Result<T> = std::result::Result<T, SortError>;

/// Error type for samsort operations
#[derive(Error, Debug)]
pub enum SortError {
    /// Reference-sequence declaration in the header is malformed
    #[error("Malformed @SQ declaration ({reason}): '{line}'")]
    MalformedHeader {
        /// Explanation of the problem
        reason: String,
        /// Excerpt of the offending header line
        line: String,
    },

    /// Data line lacks the fields needed to compute a sort key
    #[error("Malformed record ({reason}): '{line}'")]
    MalformedRecord {
        /// Explanation of the problem
        reason: String,
        /// Excerpt of the offending record line
        line: String,
    },

    /// Line bytes for one bucket exceed the per-worker memory budget
    #[error("Arena overflow: appending {requested} bytes would exceed the {capacity}-byte slab")]
    ArenaOverflow {
        /// Bytes the append would have needed in total
        requested: u64,
        /// Capacity of the arena slab
        capacity: u64,
    },

    /// Decoder, encoder, or concatenator exited nonzero or closed its pipe early
    #[error("{collaborator} failed: {reason}")]
    CollaboratorFailure {
        /// Which collaborator invocation failed (e.g. "decoder (samtools view)")
        collaborator: String,
        /// Exit status or pipe condition
        reason: String,
    },

    /// Filesystem or pipe I/O error not attributable to a collaborator exit
    #[error("I/O failure on '{path}': {source}")]
    IoFailure {
        /// Path of the file or pipe involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Truncate a raw input line for inclusion in an error message.
#[must_use]
pub fn line_excerpt(line: &[u8]) -> String {
    const MAX: usize = 80;
    let shown = &line[..line.len().min(MAX)];
    let mut s = String::from_utf8_lossy(shown).into_owned();
    if line.len() > MAX {
        s.push_str("...");
    }
    s
}
