//! Header parsing and the reference table.
//!
//! The first streaming pass feeds every leading header line (first byte `@`)
//! into a [`ReferenceTable`], which collects `@SQ` reference-sequence
//! declarations into a contig → genome-offset map and retains the header
//! text verbatim. The retained lines are written as the first bytes of every
//! shard so that each shard is a self-contained container.
//!
//! Genome offsets linearize the reference space: a contig's offset is the
//! cumulative length of all contigs declared before it, so `offset + position`
//! yields a single 64-bit coordinate that orders records across chromosomes.

use std::collections::HashMap;

use bstr::{BString, ByteSlice};

use crate::errors::{line_excerpt, Result, SortError};

/// First byte of a header line.
pub const HEADER_PREFIX: u8 = b'@';

/// Tag of a reference-sequence declaration line.
const SQ_TAG: &[u8] = b"@SQ";

/// Returns true if the line is a header line.
#[inline]
#[must_use]
pub fn is_header_line(line: &[u8]) -> bool {
    line.first() == Some(&HEADER_PREFIX)
}

/// Ordered reference-sequence declarations plus the verbatim header text.
///
/// Populated once during the first pass; immutable thereafter and read
/// concurrently by workers without synchronization.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    /// Header lines exactly as read, without trailing newline.
    lines: Vec<BString>,
    /// Contig name → cumulative genome offset.
    offsets: HashMap<BString, u64>,
    /// Declaration order, for diagnostics and tests.
    names: Vec<BString>,
    /// Total length of all declared references.
    genome_len: u64,
}

impl ReferenceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one header line: retains it verbatim and, for `@SQ` lines,
    /// records the declared reference.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::MalformedHeader`] if an `@SQ` line carries an
    /// `SN:` or `LN:` field of length <= 3 (an empty payload), lacks either
    /// field, or has a non-numeric length.
    pub fn push_header_line(&mut self, line: &[u8]) -> Result<()> {
        debug_assert!(is_header_line(line));
        self.lines.push(BString::from(line));

        let mut fields = line.split(|&b| b == b'\t');
        if fields.next() != Some(SQ_TAG) {
            return Ok(());
        }

        let mut name: Option<&[u8]> = None;
        let mut length: Option<u64> = None;
        for field in fields {
            if let Some(payload) = field.strip_prefix(b"SN:") {
                if field.len() <= 3 {
                    return Err(malformed(line, "SN field too short"));
                }
                name = Some(payload);
            } else if let Some(payload) = field.strip_prefix(b"LN:") {
                if field.len() <= 3 {
                    return Err(malformed(line, "LN field too short"));
                }
                let text =
                    payload.to_str().map_err(|_| malformed(line, "LN field is not valid text"))?;
                length = Some(
                    text.parse::<u64>()
                        .map_err(|_| malformed(line, "LN field is not a number"))?,
                );
            }
        }

        match (name, length) {
            (Some(name), Some(length)) => {
                self.offsets.insert(BString::from(name), self.genome_len);
                self.names.push(BString::from(name));
                self.genome_len += length;
                Ok(())
            }
            (None, _) => Err(malformed(line, "missing SN field")),
            (_, None) => Err(malformed(line, "missing LN field")),
        }
    }

    /// Cumulative genome offset of a declared contig, by byte-string equality.
    #[must_use]
    pub fn genome_offset(&self, name: &[u8]) -> Option<u64> {
        self.offsets.get(name.as_bstr()).copied()
    }

    /// Total length of all declared references.
    #[must_use]
    pub fn genome_len(&self) -> u64 {
        self.genome_len
    }

    /// Number of declared references.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.names.len()
    }

    /// The retained header lines, in input order, without trailing newlines.
    #[must_use]
    pub fn header_lines(&self) -> &[BString] {
        &self.lines
    }

    /// Number of retained header lines (of any kind, not just `@SQ`).
    #[must_use]
    pub fn header_line_count(&self) -> usize {
        self.lines.len()
    }
}

fn malformed(line: &[u8], reason: &str) -> SortError {
    SortError::MalformedHeader { reason: reason.to_string(), line: line_excerpt(line) }
}
