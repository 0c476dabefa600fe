//! The two-pass external sort pipeline.
//!
//! The driver thread runs the header/histogram pass, plans the buckets,
//! runs the routing pass, and hands the routed buckets to the worker pool.
//! The concatenator then merges the shards in bucket order, which restores
//! the global coordinate order no matter how workers were scheduled.
//!
//! Every intermediate file has exactly one producer and one consumer and is
//! deleted as soon as it is consumed; on error paths a guard removes every
//! known intermediate, and the output file too if concatenation had started.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytesize::ByteSize;
use log::{info, warn};

use crate::codec::ContainerCodec;
use crate::header::{is_header_line, ReferenceTable};
use crate::histogram::CoordinateHistogram;
use crate::keys::{coordinate_key, UNALIGNED_KEY};
use crate::layout::TempLayout;
use crate::logging::{format_count, OperationTimer};
use crate::plan::BucketPlan;
use crate::pool::WorkerPool;
use crate::progress::ProgressTracker;
use crate::route::Router;

/// Default total memory cap (2 GiB).
const DEFAULT_MEMORY: u64 = 2 * 1024 * 1024 * 1024;

/// Statistics from a sort run.
#[derive(Debug, Default, Clone)]
pub struct SortStats {
    /// Data records read from the input.
    pub total_records: u64,
    /// Records with the unaligned sentinel contig.
    pub unaligned_records: u64,
    /// Header lines retained and replicated into every shard.
    pub header_lines: usize,
    /// Aligned (sorted) buckets planned.
    pub aligned_buckets: usize,
    /// Unaligned (pass-through) buckets planned.
    pub unaligned_buckets: usize,
}

/// External, memory-bounded, parallel coordinate sort.
pub struct SortPipeline<'a> {
    codec: &'a dyn ContainerCodec,
    memory: u64,
    workers: usize,
}

impl<'a> SortPipeline<'a> {
    /// Creates a pipeline over the given collaborators with a 2 GiB memory
    /// cap and one worker.
    #[must_use]
    pub fn new(codec: &'a dyn ContainerCodec) -> Self {
        Self { codec, memory: DEFAULT_MEMORY, workers: 1 }
    }

    /// Sets the total memory cap shared by all workers.
    #[must_use]
    pub fn memory(mut self, bytes: u64) -> Self {
        self.memory = bytes.max(1);
        self
    }

    /// Sets the worker count (minimum 1).
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sorts `input` into `output` by genomic coordinate.
    ///
    /// # Errors
    ///
    /// All error kinds are fatal; the message names the failing stage and,
    /// where applicable, the responsible bucket. Intermediates are removed
    /// before the error is returned.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        let layout = TempLayout::new(input);
        let mut guard = CleanupGuard::new(&layout);
        let stats = self.run(input, output, &layout, &mut guard)?;
        guard.disarm();
        Ok(stats)
    }

    fn run(
        &self,
        input: &Path,
        output: &Path,
        layout: &TempLayout,
        guard: &mut CleanupGuard,
    ) -> Result<SortStats> {
        let budget = (self.memory / self.workers as u64).max(1);
        info!("Sorting '{}' into '{}'", input.display(), output.display());
        info!(
            "Memory cap: {} across {} workers ({} per worker)",
            ByteSize(self.memory),
            self.workers,
            ByteSize(budget)
        );

        let timer = OperationTimer::new("First pass (header + histogram)");
        let (refs, histogram, mut stats) =
            self.first_pass(input).context("header stage failed")?;
        timer.log_completion(stats.total_records);
        info!(
            "Found {} references, {} header lines, {} of records",
            refs.reference_count(),
            stats.header_lines,
            ByteSize(histogram.total_bytes())
        );

        let plan = BucketPlan::build(&histogram, budget);
        guard.planned(plan.len());
        stats.aligned_buckets = plan.aligned_count();
        stats.unaligned_buckets = plan.unaligned_count();

        if plan.is_empty() {
            info!("No data records; writing the header alone");
            self.write_header_only(output, &refs).context("shard-write stage failed")?;
            self.log_summary(&stats, output);
            return Ok(stats);
        }
        info!(
            "Planned {} buckets ({} aligned, {} unaligned)",
            plan.len(),
            stats.aligned_buckets,
            stats.unaligned_buckets
        );

        let timer = OperationTimer::new("Routing pass");
        let routed = self
            .routing_pass(input, &refs, &plan, layout)
            .context("routing stage failed")?;
        timer.log_completion(routed);

        let timer = OperationTimer::new("Sorting buckets");
        let emitted = WorkerPool::new(&plan, &refs, self.codec, layout, self.workers).run()?;
        timer.log_completion(emitted);

        let timer = OperationTimer::new("Concatenating shards");
        let shards: Vec<PathBuf> =
            plan.buckets().iter().map(|bucket| layout.shard_path(bucket.id)).collect();
        guard.concat_started(output);
        self.codec.concatenate(&shards, output).context("concat stage failed")?;
        guard.concat_done();
        for shard in &shards {
            std::fs::remove_file(shard)
                .with_context(|| format!("concat stage failed to remove '{}'", shard.display()))?;
        }
        timer.log_completion(emitted);

        self.log_summary(&stats, output);
        Ok(stats)
    }

    /// Single pass building the reference table and the byte histogram.
    /// No record body is materialized beyond the current line.
    fn first_pass(&self, input: &Path) -> Result<(ReferenceTable, CoordinateHistogram, SortStats)> {
        let mut reader = self.codec.spawn_reader(input)?;
        let mut refs = ReferenceTable::new();
        let mut histogram = CoordinateHistogram::new();
        let mut stats = SortStats::default();
        let progress = ProgressTracker::new("Scanned records");

        let mut buf = Vec::new();
        let mut in_header = true;
        while reader.read_line(&mut buf)? {
            if in_header && is_header_line(&buf) {
                refs.push_header_line(&buf)?;
                continue;
            }
            in_header = false;
            let key = coordinate_key(&buf, &refs)?;
            histogram.observe(key, buf.len() as u64 + 1);
            stats.total_records += 1;
            if key == UNALIGNED_KEY {
                stats.unaligned_records += 1;
            }
            progress.add(1);
        }
        progress.log_final();
        reader.finish()?;

        stats.header_lines = refs.header_line_count();
        Ok((refs, histogram, stats))
    }

    /// Second pass scattering every data line into its bucket file.
    fn routing_pass(
        &self,
        input: &Path,
        refs: &ReferenceTable,
        plan: &BucketPlan,
        layout: &TempLayout,
    ) -> Result<u64> {
        let mut reader = self.codec.spawn_reader(input)?;
        let mut router = Router::open(plan, refs, layout)?;
        let progress = ProgressTracker::new("Routed records");

        let mut buf = Vec::new();
        let mut in_header = true;
        while reader.read_line(&mut buf)? {
            if in_header && is_header_line(&buf) {
                continue;
            }
            in_header = false;
            router.route_line(&buf)?;
            progress.add(1);
        }
        progress.log_final();
        let routed = router.finish()?;
        reader.finish()?;
        Ok(routed)
    }

    fn write_header_only(&self, output: &Path, refs: &ReferenceTable) -> Result<()> {
        let mut writer = self.codec.spawn_writer(output)?;
        for line in refs.header_lines() {
            writer.write_line(line.as_ref())?;
        }
        writer.finish()?;
        Ok(())
    }

    fn log_summary(&self, stats: &SortStats, output: &Path) {
        info!("=== Summary ===");
        info!("Records sorted: {}", format_count(stats.total_records));
        if stats.unaligned_records > 0 {
            info!("Unaligned records: {}", format_count(stats.unaligned_records));
        }
        info!(
            "Buckets: {} aligned, {} unaligned",
            stats.aligned_buckets, stats.unaligned_buckets
        );
        info!("Output: {}", output.display());
    }
}

/// Removes intermediates (and a half-written output) when a run fails.
struct CleanupGuard<'a> {
    layout: &'a TempLayout,
    buckets: usize,
    output: Option<PathBuf>,
    armed: bool,
}

impl<'a> CleanupGuard<'a> {
    fn new(layout: &'a TempLayout) -> Self {
        Self { layout, buckets: 0, output: None, armed: true }
    }

    /// Records how many bucket/shard slots may exist from here on.
    fn planned(&mut self, buckets: usize) {
        self.buckets = buckets;
    }

    /// The output path is invalid from now until `concat_done`.
    fn concat_started(&mut self, output: &Path) {
        self.output = Some(output.to_path_buf());
    }

    fn concat_done(&mut self) {
        self.output = None;
    }

    /// The run succeeded; everything left on disk is the final output.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.layout.remove_intermediates(self.buckets);
        if let Some(output) = &self.output {
            if let Err(e) = std::fs::remove_file(output) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove incomplete output '{}': {e}", output.display());
                }
            }
        }
    }
}
