//! Routing pass: scatter records into their planned bucket files.
//!
//! The second full pass over the decoder's stream. Every bucket file is
//! opened up front; each data line is appended unchanged to the file of the
//! bucket its histogram bin was assigned to. Unaligned lines are assigned by
//! their byte offset within the tail stream, so input order is preserved
//! across the unaligned buckets. Any bucket-file I/O error is fatal.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::errors::{Result, SortError};
use crate::header::ReferenceTable;
use crate::histogram::INTERVAL;
use crate::keys::{coordinate_key, UNALIGNED_KEY};
use crate::layout::TempLayout;
use crate::plan::BucketPlan;

/// Writes record lines to the bucket files of a plan.
pub struct Router<'a> {
    plan: &'a BucketPlan,
    refs: &'a ReferenceTable,
    writers: Vec<BufWriter<File>>,
    paths: Vec<PathBuf>,
    unaligned_offset: u64,
    routed: u64,
}

impl<'a> Router<'a> {
    /// Creates every bucket file of the plan up front.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::IoFailure`] if any bucket file cannot be created.
    pub fn open(plan: &'a BucketPlan, refs: &'a ReferenceTable, layout: &TempLayout) -> Result<Self> {
        let mut writers = Vec::with_capacity(plan.len());
        let mut paths = Vec::with_capacity(plan.len());
        for bucket in plan.buckets() {
            let path = layout.bucket_path(bucket.id);
            let file = File::create(&path)
                .map_err(|e| SortError::IoFailure { path: path.clone(), source: e })?;
            writers.push(BufWriter::new(file));
            paths.push(path);
        }
        Ok(Self { plan, refs, writers, paths, unaligned_offset: 0, routed: 0 })
    }

    /// Appends one data line, unchanged, to its bucket file.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::MalformedRecord`] for unparseable lines,
    /// [`SortError::IoFailure`] for bucket-file write failures, and
    /// [`SortError::CollaboratorFailure`] if the record cannot be placed in
    /// any planned bucket, which means the decoder produced a different
    /// stream than in the first pass.
    pub fn route_line(&mut self, line: &[u8]) -> Result<()> {
        let key = coordinate_key(line, self.refs)?;
        let bucket = if key == UNALIGNED_KEY {
            let bucket = self
                .plan
                .unaligned_bucket_for_offset(self.unaligned_offset)
                .ok_or_else(|| Self::stream_changed("an unplanned unaligned record"))?;
            self.unaligned_offset += line.len() as u64 + 1;
            bucket
        } else {
            let bin = (key / INTERVAL) as usize;
            if bin >= self.plan.bin_count() {
                return Err(Self::stream_changed("a record beyond the planned coordinate range"));
            }
            self.plan.bucket_for_bin(bin)
        };

        if bucket >= self.writers.len() {
            return Err(Self::stream_changed("a record in an unplanned bucket"));
        }
        let writer = &mut self.writers[bucket];
        writer
            .write_all(line)
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| SortError::IoFailure { path: self.paths[bucket].clone(), source: e })?;
        self.routed += 1;
        Ok(())
    }

    fn stream_changed(what: &str) -> SortError {
        SortError::CollaboratorFailure {
            collaborator: "decoder".to_string(),
            reason: format!("second pass produced {what} absent from the first pass"),
        }
    }

    /// Flushes and closes all bucket files; returns the routed record count.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::IoFailure`] if any flush fails.
    pub fn finish(mut self) -> Result<u64> {
        for (writer, path) in self.writers.iter_mut().zip(&self.paths) {
            writer
                .flush()
                .map_err(|e| SortError::IoFailure { path: path.clone(), source: e })?;
        }
        Ok(self.routed)
    }
}
