//! Bucket planner: collapses the histogram into memory-sized buckets.
//!
//! Buckets are numbered in coordinate order and that number is their final
//! output order, so the concatenator restores the global sort regardless of
//! which worker processes which bucket. Aligned buckets are loaded into a
//! worker arena and sorted; unaligned buckets are streamed through the
//! encoder untouched and therefore carry no memory obligation.

use log::warn;

use crate::histogram::CoordinateHistogram;

/// Whether a bucket's records will be sorted or passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    /// Finite keys; loaded into an arena and sorted.
    Aligned,
    /// Tail records; streamed through the encoder in input order.
    Unaligned,
}

/// One planned bucket.
#[derive(Debug, Clone)]
pub struct Bucket {
    /// Bucket number; also its position in the final output.
    pub id: usize,
    /// Sortable or pass-through.
    pub kind: BucketKind,
    /// Planned byte weight (line lengths including terminators).
    pub weight: u64,
}

/// The ordered bucket list plus the bin → bucket routing table.
///
/// Owned exclusively by the planning phase, then shared read-only with the
/// routing pass and the workers.
#[derive(Debug)]
pub struct BucketPlan {
    buckets: Vec<Bucket>,
    /// Bucket index per histogram bin; entries for empty trailing bins may
    /// point one past the last bucket and are never consulted.
    bin_to_bucket: Vec<u32>,
    /// Index of the first unaligned bucket, if any.
    first_unaligned: Option<usize>,
    /// Per-worker byte budget the plan was built for.
    budget: u64,
}

impl BucketPlan {
    /// Plans buckets for `histogram` under a per-worker byte budget.
    ///
    /// Walks the aligned bins in coordinate order, closing the current bucket
    /// whenever the next bin would push it past the budget. A single bin that
    /// alone exceeds the budget is placed in its own bucket as a best-effort
    /// overflow; the claiming worker grows its arena for that one bucket.
    /// The unaligned tail is split byte-exactly into buckets of at most one
    /// budget each.
    #[must_use]
    pub fn build(histogram: &CoordinateHistogram, budget: u64) -> Self {
        let budget = budget.max(1);
        let mut buckets: Vec<Bucket> = Vec::new();
        let mut bin_to_bucket = Vec::with_capacity(histogram.bins().len());
        let mut current = 0u64;

        for &weight in histogram.bins() {
            if current + weight > budget && current > 0 {
                buckets.push(Bucket {
                    id: buckets.len(),
                    kind: BucketKind::Aligned,
                    weight: current,
                });
                current = 0;
            }
            bin_to_bucket.push(buckets.len() as u32);
            current += weight;
        }
        if current > 0 {
            buckets.push(Bucket { id: buckets.len(), kind: BucketKind::Aligned, weight: current });
        }

        let mut first_unaligned = None;
        let mut tail = histogram.tail();
        if tail > 0 {
            first_unaligned = Some(buckets.len());
            while tail > 0 {
                let weight = tail.min(budget);
                buckets.push(Bucket { id: buckets.len(), kind: BucketKind::Unaligned, weight });
                tail -= weight;
            }
        }

        for bucket in &buckets {
            if bucket.weight > budget {
                warn!(
                    "bucket {} holds {} bytes from a single {}-byte window, exceeding the \
                     per-worker budget of {} bytes",
                    bucket.id,
                    bucket.weight,
                    crate::histogram::INTERVAL,
                    budget
                );
            }
        }

        Self { buckets, bin_to_bucket, first_unaligned, budget }
    }

    /// The planned buckets in output order.
    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Number of planned buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True when the input had no data records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket holding the records of an aligned histogram bin.
    #[must_use]
    pub fn bucket_for_bin(&self, bin: usize) -> usize {
        self.bin_to_bucket[bin] as usize
    }

    /// Number of histogram bins the plan covers.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bin_to_bucket.len()
    }

    /// Bucket for an unaligned record whose first byte lands at `offset`
    /// within the tail byte stream.
    ///
    /// Line-atomic routing means a bucket can overrun its planned weight by
    /// at most one record; unaligned buckets are streamed, never
    /// arena-loaded, so the overrun is harmless.
    #[must_use]
    pub fn unaligned_bucket_for_offset(&self, offset: u64) -> Option<usize> {
        let first = self.first_unaligned?;
        let last = self.buckets.len() - 1 - first;
        Some(first + ((offset / self.budget) as usize).min(last))
    }

    /// Number of aligned buckets.
    #[must_use]
    pub fn aligned_count(&self) -> usize {
        self.first_unaligned.unwrap_or(self.buckets.len())
    }

    /// Number of unaligned buckets.
    #[must_use]
    pub fn unaligned_count(&self) -> usize {
        self.buckets.len() - self.aligned_count()
    }

    /// The per-worker budget the plan was built for.
    #[must_use]
    pub fn budget(&self) -> u64 {
        self.budget
    }
}
