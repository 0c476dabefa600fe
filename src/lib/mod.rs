#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

//! # samsort - external coordinate sort for SAM/BAM record streams
//!
//! Sorts alignment records by genomic coordinate without ever holding the
//! input in memory. The container format is handled by external
//! collaborators (samtools or sambamba child processes, or any other
//! implementation of the [`codec::ContainerCodec`] byte-stream contract);
//! the core operates on the decompressed textual record stream.
//!
//! ## Pipeline
//!
//! 1. **First pass** - parse the header into a [`header::ReferenceTable`]
//!    and build a coarse byte [`histogram::CoordinateHistogram`] over the
//!    linearized genome.
//! 2. **Planning** - collapse histogram bins into buckets that each fit the
//!    per-worker memory budget ([`plan::BucketPlan`]).
//! 3. **Routing pass** - scatter every record line into its bucket file
//!    ([`route::Router`]).
//! 4. **Sorting** - a pool of OS threads claims buckets off a shared atomic
//!    counter; each bucket is loaded into a per-worker [`arena::LineArena`],
//!    index-sorted by `(coordinate, arrival)`, and emitted as a compressed
//!    shard ([`pool::WorkerPool`], [`shard`]).
//! 5. **Concatenation** - the shards are merged in bucket order, which is
//!    coordinate order, into the final output ([`pipeline::SortPipeline`]).
//!
//! Memory use during the sort phase is bounded by `workers x budget`;
//! bucket files are deleted as they are consumed and shards after
//! concatenation, so a successful run leaves no intermediates behind.

pub mod arena;
pub mod codec;
pub mod errors;
pub mod header;
pub mod histogram;
pub mod keys;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod pool;
pub mod progress;
pub mod route;
pub mod shard;

pub use errors::{Result, SortError};
pub use pipeline::{SortPipeline, SortStats};
