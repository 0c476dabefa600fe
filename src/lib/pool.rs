//! Worker pool: parallel bucket processing with a shared claim counter.
//!
//! One OS thread per configured worker. Workers steal work by fetch-adding a
//! shared atomic bucket counter; whichever worker claims a bucket owns it
//! end to end (load, sort, emit, delete). No ordering is required across
//! workers because the concatenator restores the output order from bucket
//! numbers.
//!
//! There is no cancellation: a failing worker returns its error and the
//! others keep draining the counter; the driver surfaces the first error
//! after joining all of them.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};

use crate::arena::{LineArena, LineIndexEntry};
use crate::codec::ContainerCodec;
use crate::errors::SortError;
use crate::header::ReferenceTable;
use crate::keys::coordinate_key;
use crate::layout::TempLayout;
use crate::plan::{Bucket, BucketKind, BucketPlan};
use crate::progress::ProgressTracker;
use crate::shard;

/// Sorts every planned bucket into its shard using `workers` threads.
pub struct WorkerPool<'a> {
    plan: &'a BucketPlan,
    refs: &'a ReferenceTable,
    codec: &'a dyn ContainerCodec,
    layout: &'a TempLayout,
    workers: usize,
}

impl<'a> WorkerPool<'a> {
    /// Creates a pool over a routed plan. The reference table and plan are
    /// read-only from here on and shared across workers without locks.
    #[must_use]
    pub fn new(
        plan: &'a BucketPlan,
        refs: &'a ReferenceTable,
        codec: &'a dyn ContainerCodec,
        layout: &'a TempLayout,
        workers: usize,
    ) -> Self {
        Self { plan, refs, codec, layout, workers: workers.max(1) }
    }

    /// Runs the pool to completion and returns the number of records
    /// emitted into shards.
    ///
    /// # Errors
    ///
    /// Returns the first worker error, annotated with the failing bucket ID.
    pub fn run(&self) -> Result<u64> {
        let next_bucket = AtomicU64::new(0);
        let progress = ProgressTracker::new("Emitted records");

        let results: Vec<Result<u64>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|worker_id| {
                    let next_bucket = &next_bucket;
                    let progress = &progress;
                    scope.spawn(move || self.worker_loop(worker_id, next_bucket, progress))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| Err(anyhow!("worker thread panicked")))
                })
                .collect()
        });
        progress.log_final();

        let mut emitted = 0u64;
        for result in results {
            emitted += result?;
        }
        Ok(emitted)
    }

    fn worker_loop(
        &self,
        worker_id: usize,
        next_bucket: &AtomicU64,
        progress: &ProgressTracker,
    ) -> Result<u64> {
        let mut arena = LineArena::with_capacity(self.plan.budget());
        let mut index: Vec<LineIndexEntry> = Vec::new();
        let mut emitted = 0u64;

        loop {
            let id = next_bucket.fetch_add(1, Ordering::SeqCst) as usize;
            if id >= self.plan.len() {
                break;
            }
            let bucket = &self.plan.buckets()[id];
            debug!(
                "worker {worker_id} claimed bucket {id} ({:?}, {} bytes)",
                bucket.kind, bucket.weight
            );
            let records = match bucket.kind {
                BucketKind::Aligned => self
                    .sort_bucket(bucket, &mut arena, &mut index)
                    .with_context(|| format!("sort stage failed for bucket {id}"))?,
                BucketKind::Unaligned => self
                    .stream_bucket(bucket)
                    .with_context(|| format!("shard-write stage failed for bucket {id}"))?,
            };
            progress.add(records);
            emitted += records;
        }
        Ok(emitted)
    }

    /// Loads an aligned bucket into the arena, sorts its index by
    /// `(key, arrival)`, emits the shard, and deletes the bucket file.
    fn sort_bucket(
        &self,
        bucket: &Bucket,
        arena: &mut LineArena,
        index: &mut Vec<LineIndexEntry>,
    ) -> Result<u64> {
        if bucket.weight > arena.capacity() {
            warn!(
                "bucket {} outweighs the per-worker budget; growing the arena to {} bytes",
                bucket.id, bucket.weight
            );
            arena.grow_to(bucket.weight);
        }
        arena.reset();
        index.clear();

        let path = self.layout.bucket_path(bucket.id);
        let file = File::open(&path)
            .map_err(|e| SortError::IoFailure { path: path.clone(), source: e })?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| SortError::IoFailure { path: path.clone(), source: e })?;
            if n == 0 {
                break;
            }
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            let key = coordinate_key(&buf, self.refs)?;
            let offset = arena.append(&buf)?;
            index.push(LineIndexEntry { key, arrival: index.len() as u64, offset });
        }

        index.sort_unstable_by_key(|entry| (entry.key, entry.arrival));

        shard::write_shard(
            self.codec,
            &self.layout.shard_path(bucket.id),
            self.refs.header_lines(),
            index.iter().map(|entry| arena.line(entry.offset)),
        )?;

        std::fs::remove_file(&path).map_err(|e| SortError::IoFailure { path, source: e })?;
        Ok(index.len() as u64)
    }

    /// Streams an unaligned bucket through the encoder in input order, then
    /// deletes the bucket file. No sorting, no arena use.
    fn stream_bucket(&self, bucket: &Bucket) -> Result<u64> {
        let path = self.layout.bucket_path(bucket.id);
        let records = shard::stream_shard(
            self.codec,
            &self.layout.shard_path(bucket.id),
            self.refs.header_lines(),
            &path,
        )?;
        std::fs::remove_file(&path).map_err(|e| SortError::IoFailure { path, source: e })?;
        Ok(records)
    }
}
