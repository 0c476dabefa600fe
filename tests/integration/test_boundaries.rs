//! Boundary behaviors: empty inputs, unaligned-only inputs, idempotence.

use crate::helpers::{assert_no_intermediates, sort_text, SamBuilder};

const MIB: u64 = 1024 * 1024;

#[test]
fn test_header_only_input_yields_header_only_output() {
    let input = SamBuilder::new()
        .header_line("@HD\tVN:1.6")
        .reference("chr1", 100)
        .text();

    let run = sort_text(&input, 2 * MIB, 4);
    assert_eq!(run.stats.total_records, 0);

    let output = std::fs::read_to_string(&run.output).unwrap();
    assert_eq!(output, input);
    assert_no_intermediates(&run.input);
}

#[test]
fn test_unaligned_only_input_is_passed_through() {
    let mut builder = SamBuilder::new().reference("chr1", 100);
    for i in 0..10 {
        builder = builder.unaligned(&format!("u{i}"));
    }
    let input = builder.text();

    let run = sort_text(&input, 2 * MIB, 2);
    assert_eq!(run.stats.total_records, 10);
    assert_eq!(run.stats.unaligned_records, 10);
    assert_eq!(run.stats.aligned_buckets, 0);

    let output = std::fs::read_to_string(&run.output).unwrap();
    assert_eq!(output, input, "unaligned-only input must pass through byte-for-byte");
}

#[test]
fn test_sorting_a_sorted_input_is_identity() {
    let input = SamBuilder::new()
        .reference("chr1", 1000)
        .record("a", "chr1", 1)
        .record("b", "chr1", 50)
        .record("c", "chr1", 50)
        .record("d", "chr1", 900)
        .unaligned("e")
        .text();

    let run = sort_text(&input, 2 * MIB, 2);
    let output = std::fs::read_to_string(&run.output).unwrap();
    assert_eq!(output, input);
}

#[test]
fn test_sorting_twice_equals_sorting_once() {
    let input = SamBuilder::new()
        .reference("chr1", 1000)
        .reference("chr2", 1000)
        .record("a", "chr2", 7)
        .record("b", "chr1", 500)
        .unaligned("c")
        .record("d", "chr1", 3)
        .text();

    let once = sort_text(&input, 2 * MIB, 2);
    let sorted = std::fs::read_to_string(&once.output).unwrap();

    let twice = sort_text(&sorted, 2 * MIB, 2);
    let resorted = std::fs::read_to_string(&twice.output).unwrap();
    assert_eq!(resorted, sorted);
}

#[test]
fn test_single_record_input() {
    let input = SamBuilder::new().reference("chr1", 100).record("only", "chr1", 42).text();

    let run = sort_text(&input, 2 * MIB, 8);
    assert_eq!(run.stats.total_records, 1);
    let output = std::fs::read_to_string(&run.output).unwrap();
    assert_eq!(output, input);
}
