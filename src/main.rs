#![deny(unsafe_code)]

//! samsort command-line interface.
//!
//! User errors (bad arguments, nonexistent input) exit 0 with a one-line
//! diagnostic; a nonzero exit means a collaborator or the pipeline itself
//! failed mid-run.

use std::path::PathBuf;
use std::process::ExitCode;

use bytesize::ByteSize;
use clap::Parser;
use env_logger::Env;
use log::info;
use samsort_lib::codec::{CodecFlavor, ProcessCodec};
use samsort_lib::pipeline::SortPipeline;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Highest compression level the encoders accept.
const MAX_COMPRESSION: u32 = 9;

/// Sort a BAM/SAM file by genomic coordinate.
///
/// Two streaming passes plan and scatter records into memory-sized buckets;
/// a worker pool sorts the buckets in parallel into shards that are
/// concatenated, in coordinate order, into the output.
#[derive(Debug, Parser)]
#[command(name = "samsort", version)]
struct Args {
    /// Input BAM (or SAM, with -S) file
    input: PathBuf,

    /// Compression level for output, 0 (fastest) to 9 (smallest); clamped
    #[arg(short = 'l', long = "compression-level", default_value_t = 6)]
    compression_level: u32,

    /// Maximum memory in total, shared by workers (K/M/G suffixes, powers of 1024)
    #[arg(short = 'm', long = "max-memory", default_value = "2G", value_parser = parse_memory)]
    max_memory: u64,

    /// Output filename (default: <input>.sorted)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Number of worker threads (minimum 1)
    #[arg(short = '@', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Input file is uncompressed SAM text
    #[arg(short = 'S', long = "sam")]
    sam: bool,

    /// Use sambamba instead of samtools for decoding and encoding
    #[arg(long = "sambamba")]
    sambamba: bool,
}

/// Parse a memory size with K/M/G suffixes as powers of 1024.
fn parse_memory(s: &str) -> Result<u64, String> {
    let s = s.trim().to_uppercase();
    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (num_str, multiplier) = if let Some(rest) = s.strip_suffix('G') {
        (rest, 1024 * 1024 * 1024)
    } else if let Some(rest) = s.strip_suffix('M') {
        (rest, 1024 * 1024)
    } else if let Some(rest) = s.strip_suffix('K') {
        (rest, 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;
    if num == 0 {
        return Err("Memory size must be positive".to_string());
    }
    num.checked_mul(multiplier).ok_or_else(|| format!("Memory size overflow: {s}"))
}

fn main() -> ExitCode {
    // Bad arguments are user errors: print the diagnostic and exit 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if !args.input.exists() {
        eprintln!("Error: {} does not exist.", args.input.display());
        return ExitCode::SUCCESS;
    }

    let compression = args.compression_level.min(MAX_COMPRESSION);
    let workers = args.threads.max(1);
    let output = args.output.clone().unwrap_or_else(|| {
        let mut name = args.input.clone().into_os_string();
        name.push(".sorted");
        PathBuf::from(name)
    });

    if args.verbose {
        info!(
            "samsort is executed with {} memory and {} {}",
            ByteSize(args.max_memory),
            workers,
            if workers == 1 { "worker" } else { "workers" }
        );
    }

    let flavor = if args.sambamba { CodecFlavor::Sambamba } else { CodecFlavor::Samtools };
    let codec = ProcessCodec::new(flavor)
        .threads(workers)
        .compression(compression)
        .text_input(args.sam);
    let pipeline = SortPipeline::new(&codec).memory(args.max_memory).workers(workers);

    match pipeline.sort(&args.input, &output) {
        Ok(_stats) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
