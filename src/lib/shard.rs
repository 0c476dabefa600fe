//! Shard emission: header plus records through the encoder.
//!
//! Every shard begins with the input's header text, byte-identical, so each
//! shard is a valid container on its own and the concatenator can merge them
//! without re-reading the input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bstr::BString;

use crate::codec::ContainerCodec;
use crate::errors::{Result, SortError};

/// Writes the header followed by `lines`, in the given order, to the encoder
/// targeting `shard`.
///
/// # Errors
///
/// Returns [`SortError::CollaboratorFailure`] when the encoder exits nonzero
/// or closes its pipe, and [`SortError::IoFailure`] for other write errors.
pub fn write_shard<'a>(
    codec: &dyn ContainerCodec,
    shard: &Path,
    header: &[BString],
    lines: impl IntoIterator<Item = &'a [u8]>,
) -> Result<()> {
    let mut writer = codec.spawn_writer(shard)?;
    for line in header {
        writer.write_line(line.as_ref())?;
    }
    for line in lines {
        writer.write_line(line)?;
    }
    writer.finish()
}

/// Streams a bucket file through the encoder with the header prepended,
/// preserving the file's record order. Used for unaligned buckets, which
/// bypass the sort. Returns the number of records written.
///
/// # Errors
///
/// As [`write_shard`], plus [`SortError::IoFailure`] if the bucket file
/// cannot be read.
pub fn stream_shard(
    codec: &dyn ContainerCodec,
    shard: &Path,
    header: &[BString],
    source: &Path,
) -> Result<u64> {
    let mut writer = codec.spawn_writer(shard)?;
    for line in header {
        writer.write_line(line.as_ref())?;
    }

    let file = File::open(source)
        .map_err(|e| SortError::IoFailure { path: source.to_path_buf(), source: e })?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut records = 0u64;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| SortError::IoFailure { path: source.to_path_buf(), source: e })?;
        if n == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        writer.write_line(&buf)?;
        records += 1;
    }
    writer.finish()?;
    Ok(records)
}
