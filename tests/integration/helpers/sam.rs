//! SAM text fixtures and pipeline-run helpers.

use std::path::{Path, PathBuf};

use samsort_lib::codec::TextCodec;
use samsort_lib::pipeline::{SortPipeline, SortStats};
use tempfile::TempDir;

/// Builder for small SAM text inputs.
#[derive(Default)]
pub struct SamBuilder {
    header: Vec<String>,
    records: Vec<String>,
}

impl SamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an `@SQ` reference declaration.
    pub fn reference(mut self, name: &str, length: u64) -> Self {
        self.header.push(format!("@SQ\tSN:{name}\tLN:{length}"));
        self
    }

    /// Adds an arbitrary header line.
    pub fn header_line(mut self, line: &str) -> Self {
        self.header.push(line.to_string());
        self
    }

    /// Adds an aligned record at `(contig, pos)` with placeholder alignment
    /// fields.
    pub fn record(mut self, qname: &str, contig: &str, pos: u64) -> Self {
        self.records.push(format!(
            "{qname}\t0\t{contig}\t{pos}\t60\t10M\t*\t0\t0\tACGTACGTAC\tFFFFFFFFFF"
        ));
        self
    }

    /// Adds an unaligned record (contig `*`).
    pub fn unaligned(mut self, qname: &str) -> Self {
        self.records
            .push(format!("{qname}\t4\t*\t0\t0\t*\t*\t0\t0\tACGTACGTAC\tFFFFFFFFFF"));
        self
    }

    /// The full SAM text, one line per header entry and record.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in self.header.iter().chain(&self.records) {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// A completed pipeline run over the text collaborator.
#[derive(Debug)]
pub struct SortRun {
    /// Keeps the run's temporary directory alive.
    pub _dir: TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
    pub stats: SortStats,
}

/// Sorts `input_text` with the given memory cap and worker count.
pub fn sort_text(input_text: &str, memory: u64, workers: usize) -> SortRun {
    try_sort_text(input_text, memory, workers).expect("pipeline failed")
}

/// As [`sort_text`] but surfaces pipeline errors.
pub fn try_sort_text(
    input_text: &str,
    memory: u64,
    workers: usize,
) -> anyhow::Result<SortRun> {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.sam");
    std::fs::write(&input, input_text).unwrap();
    let output = dir.path().join("out.sam");

    let stats = SortPipeline::new(&TextCodec)
        .memory(memory)
        .workers(workers)
        .sort(&input, &output)?;
    Ok(SortRun { _dir: dir, input, output, stats })
}

/// Data (non-header) lines of a SAM text file.
pub fn data_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.starts_with('@'))
        .map(str::to_string)
        .collect()
}

/// Query names (first field) of the data lines, in file order.
pub fn qnames(path: &Path) -> Vec<String> {
    data_lines(path)
        .iter()
        .map(|line| line.split('\t').next().unwrap().to_string())
        .collect()
}

/// Asserts that no `<input>.tmp.*` intermediate file is left behind.
pub fn assert_no_intermediates(input: &Path) {
    let dir = input.parent().unwrap();
    let prefix = format!("{}.tmp.", input.file_name().unwrap().to_string_lossy());
    for entry in std::fs::read_dir(dir).unwrap() {
        let name = entry.unwrap().file_name().to_string_lossy().into_owned();
        assert!(!name.starts_with(&prefix), "leftover intermediate file: {name}");
    }
}
