//! Sort-key extraction from record lines.
//!
//! A record's sort key is its position on the linearized genome: the contig's
//! cumulative offset plus the one-based position within the contig. Unaligned
//! records (contig `*`) sort after everything else via the maximum key.
//!
//! Extraction parses only the two fields needed (contig and position) and
//! never materializes the rest of the line.

use bstr::ByteSlice;

use crate::errors::{line_excerpt, Result, SortError};
use crate::header::ReferenceTable;

/// Sort key assigned to unaligned records; greater than every finite key.
pub const UNALIGNED_KEY: u64 = u64::MAX;

/// Contig sentinel marking an unaligned record.
const UNALIGNED_CONTIG: &[u8] = b"*";

/// Extracts the contig (3rd tab-delimited field) and position (4th) of a
/// record line.
///
/// # Errors
///
/// Returns [`SortError::MalformedRecord`] if the line has fewer than four
/// fields.
pub fn coordinate_fields(line: &[u8]) -> Result<(&[u8], &[u8])> {
    let mut fields = line.split(|&b| b == b'\t');
    let _qname = fields.next();
    let _flag = fields.next();
    let contig = fields.next().ok_or_else(|| malformed(line, "missing contig field"))?;
    let position = fields.next().ok_or_else(|| malformed(line, "missing position field"))?;
    Ok((contig, position))
}

/// Computes the 64-bit coordinate key of a record line.
///
/// # Errors
///
/// Returns [`SortError::MalformedRecord`] if the line lacks the contig or
/// position field, names a contig the header never declared, or carries a
/// non-numeric position.
pub fn coordinate_key(line: &[u8], refs: &ReferenceTable) -> Result<u64> {
    let (contig, position) = coordinate_fields(line)?;
    if contig == UNALIGNED_CONTIG {
        return Ok(UNALIGNED_KEY);
    }

    let offset = refs
        .genome_offset(contig)
        .ok_or_else(|| malformed(line, "unknown reference sequence"))?;
    let pos = position
        .to_str()
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| malformed(line, "position is not a number"))?;

    Ok(offset + pos)
}

fn malformed(line: &[u8], reason: &str) -> SortError {
    SortError::MalformedRecord { reason: reason.to_string(), line: line_excerpt(line) }
}
