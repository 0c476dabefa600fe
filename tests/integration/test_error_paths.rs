//! Error paths: malformed inputs, failing collaborators, cleanup.

use std::path::{Path, PathBuf};

use samsort_lib::codec::{ContainerCodec, RecordReader, RecordWriter, TextCodec};
use samsort_lib::errors::SortError;
use samsort_lib::pipeline::SortPipeline;
use tempfile::TempDir;

use crate::helpers::{try_sort_text, SamBuilder};

const MIB: u64 = 1024 * 1024;

#[test]
fn test_malformed_sq_declaration_fails_in_header_stage() {
    let input = "@SQ\tSN:\tLN:100\nr1\t0\tchr1\t5\n";
    let err = try_sort_text(input, 2 * MIB, 1).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("header stage"), "unexpected error: {msg}");
    assert!(msg.contains("SN field too short"), "unexpected error: {msg}");
}

#[test]
fn test_record_missing_position_is_fatal() {
    let input = "@SQ\tSN:chr1\tLN:100\nr1\t0\tchr1\n";
    let err = try_sort_text(input, 2 * MIB, 1).unwrap_err();
    assert!(format!("{err:#}").contains("missing position field"));
}

#[test]
fn test_record_with_undeclared_contig_is_fatal() {
    let input = "@SQ\tSN:chr1\tLN:100\nr1\t0\tchrX\t5\n";
    let err = try_sort_text(input, 2 * MIB, 1).unwrap_err();
    assert!(format!("{err:#}").contains("unknown reference sequence"));
}

/// Concatenator that always fails, for exercising the final cleanup path.
struct BrokenConcatenator;

impl ContainerCodec for BrokenConcatenator {
    fn spawn_reader(&self, input: &Path) -> samsort_lib::Result<RecordReader> {
        TextCodec.spawn_reader(input)
    }

    fn spawn_writer(&self, output: &Path) -> samsort_lib::Result<RecordWriter> {
        TextCodec.spawn_writer(output)
    }

    fn concatenate(&self, _shards: &[PathBuf], output: &Path) -> samsort_lib::Result<()> {
        // Behave like a tool that dies partway through writing.
        std::fs::write(output, b"partial").map_err(|e| SortError::IoFailure {
            path: output.to_path_buf(),
            source: e,
        })?;
        Err(SortError::CollaboratorFailure {
            collaborator: "concatenator (test)".to_string(),
            reason: "exit status 1".to_string(),
        })
    }
}

#[test]
fn test_failed_concatenation_removes_shards_and_output() {
    let dir = TempDir::new().unwrap();
    let input_path = dir.path().join("in.sam");
    let output_path = dir.path().join("out.sam");
    let input = SamBuilder::new()
        .reference("chr1", 100)
        .record("a", "chr1", 5)
        .unaligned("b")
        .text();
    std::fs::write(&input_path, input).unwrap();

    let err = SortPipeline::new(&BrokenConcatenator)
        .memory(2 * MIB)
        .workers(2)
        .sort(&input_path, &output_path)
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("concat stage failed"), "unexpected error: {msg}");

    // The half-written output and every intermediate are gone; only the
    // input remains.
    let mut remaining: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(remaining, ["in.sam"]);
}

#[test]
fn test_missing_input_surfaces_before_any_intermediate() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("absent.sam");
    let output = dir.path().join("out.sam");

    let err = SortPipeline::new(&TextCodec).sort(&input, &output).unwrap_err();
    assert!(format!("{err:#}").contains("header stage failed"));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
