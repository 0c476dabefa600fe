//! End-to-end sorting scenarios.

use crate::helpers::{assert_no_intermediates, qnames, sort_text, SamBuilder};

const MIB: u64 = 1024 * 1024;

#[test]
fn test_two_contigs_sort_across_chromosomes() {
    let input = SamBuilder::new()
        .reference("chr1", 100)
        .reference("chr2", 100)
        .record("a", "chr2", 5)
        .record("b", "chr1", 90)
        .record("c", "chr1", 5)
        .unaligned("d")
        .text();

    let run = sort_text(&input, 2 * MIB, 2);
    assert_eq!(run.stats.total_records, 4);
    assert_eq!(run.stats.unaligned_records, 1);
    assert_eq!(qnames(&run.output), ["c", "b", "a", "d"]);
    assert_no_intermediates(&run.input);
}

#[test]
fn test_equal_keys_keep_input_order() {
    let input = SamBuilder::new()
        .reference("chr1", 100)
        .record("A", "chr1", 10)
        .record("B", "chr1", 10)
        .record("C", "chr1", 10)
        .text();

    let run = sort_text(&input, 2 * MIB, 4);
    assert_eq!(qnames(&run.output), ["A", "B", "C"]);
}

#[test]
fn test_every_record_survives_exactly_once() {
    let mut builder = SamBuilder::new().reference("chr1", 1_000_000);
    for i in 0..500 {
        // Scatter positions so the input is thoroughly unsorted.
        builder = builder.record(&format!("r{i:03}"), "chr1", (i * 7919) % 999_983 + 1);
    }
    for i in 0..25 {
        builder = builder.unaligned(&format!("u{i:02}"));
    }
    let input = builder.text();

    let run = sort_text(&input, 2 * MIB, 3);
    assert_eq!(run.stats.total_records, 525);

    let mut input_lines: Vec<String> =
        input.lines().filter(|l| !l.starts_with('@')).map(str::to_string).collect();
    let mut output_lines = crate::helpers::data_lines(&run.output);
    assert_eq!(output_lines.len(), 525);
    input_lines.sort();
    output_lines.sort();
    assert_eq!(input_lines, output_lines, "records were lost, duplicated, or altered");
}

#[test]
fn test_memory_bounded_run_spans_many_buckets() {
    // ~2,000 records spread over 10 Mbp under a tiny budget forces the
    // planner to cut many aligned buckets; the output must still be globally
    // sorted and leave no intermediates behind.
    let mut builder = SamBuilder::new().reference("chr1", 10_000_000);
    for i in 0..2000u64 {
        let pos = (i * 48_271) % 9_999_991 + 1;
        builder = builder.record(&format!("r{i:04}"), "chr1", pos);
    }
    let input = builder.text();

    let run = sort_text(&input, 32 * 1024, 4); // 8 KiB per worker
    assert_eq!(run.stats.total_records, 2000);
    assert_eq!(run.stats.unaligned_buckets, 0);
    assert!(
        run.stats.aligned_buckets >= 13,
        "expected a many-bucket plan, got {}",
        run.stats.aligned_buckets
    );

    let positions: Vec<u64> = crate::helpers::data_lines(&run.output)
        .iter()
        .map(|line| line.split('\t').nth(3).unwrap().parse().unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] <= w[1]), "output is not coordinate-sorted");
    assert_no_intermediates(&run.input);
}

#[test]
fn test_unaligned_records_follow_all_aligned_records() {
    let input = SamBuilder::new()
        .reference("chr1", 1000)
        .unaligned("u1")
        .record("a", "chr1", 999)
        .unaligned("u2")
        .record("b", "chr1", 1)
        .text();

    let run = sort_text(&input, 2 * MIB, 2);
    assert_eq!(qnames(&run.output), ["b", "a", "u1", "u2"]);
}

#[test]
fn test_header_is_preserved_verbatim() {
    let input = SamBuilder::new()
        .header_line("@HD\tVN:1.6\tSO:unsorted")
        .reference("chr1", 100)
        .header_line("@PG\tID:aligner\tPN:aligner\tVN:2.0")
        .header_line("@CO\tfree-form comment\twith\ttabs")
        .record("a", "chr1", 2)
        .text();

    let run = sort_text(&input, 2 * MIB, 1);
    let output = std::fs::read_to_string(&run.output).unwrap();
    let header: Vec<&str> = output.lines().filter(|l| l.starts_with('@')).collect();
    assert_eq!(
        header,
        [
            "@HD\tVN:1.6\tSO:unsorted",
            "@SQ\tSN:chr1\tLN:100",
            "@PG\tID:aligner\tPN:aligner\tVN:2.0",
            "@CO\tfree-form comment\twith\ttabs",
        ]
    );
}
