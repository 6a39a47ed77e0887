use std::collections::HashMap;

use segperm::pvalue::{aggregate, pvalue_column};
use segperm::{
    average_pvalues, compute_pvalues, find_pvalues, permute, Household, HouseholdTable, Schema,
    SegpermError,
};

fn build(records: &[(&str, &str, &str, f64)]) -> HouseholdTable {
    let records: Vec<Household> = records
        .iter()
        .map(|&(id, block, segment, v)| Household::new(id, block, segment, vec![v]))
        .collect();
    HouseholdTable::from_records(Schema::new(vec!["A".into()]), &records).unwrap()
}

/// Two blocks, three households each, two segments per block.
fn two_by_three() -> HouseholdTable {
    build(&[
        ("1", "b1", "t1", 4.0),
        ("2", "b1", "t1", 1.0),
        ("3", "b1", "t2", -2.0),
        ("4", "b2", "t3", 0.5),
        ("5", "b2", "t4", 3.0),
        ("6", "b2", "t4", -1.0),
    ])
}

fn block_multiset<'a>(
    table: &HouseholdTable,
    labels: impl Iterator<Item = &'a str>,
) -> HashMap<(usize, &'a str), usize> {
    let mut counts = HashMap::new();
    for (row, label) in labels.enumerate() {
        *counts.entry((table.block_ids()[row], label)).or_insert(0) += 1;
    }
    counts
}

#[test]
fn two_blocks_one_iteration() {
    let mut table = two_by_three();
    let name = permute(&mut table, 0);

    let true_labels: Vec<&str> = table
        .segment_ids()
        .iter()
        .map(|&s| table.segments()[s].as_str())
        .collect();
    let permuted = table.permuted_labels(&name).unwrap();
    assert_eq!(
        block_multiset(&table, true_labels.into_iter()),
        block_multiset(&table, permuted.into_iter())
    );

    let pvals = compute_pvalues(&mut table, 1).unwrap();
    let null_rows = aggregate(&table, table.permuted("TLID_permuted_0").unwrap()).len();
    assert_eq!(null_rows, 4);
    for &p in pvals.column("A_p_0").unwrap() {
        let k = p * null_rows as f64;
        assert!((k - k.round()).abs() < 1e-12, "{p} is not a multiple of 1/{null_rows}");
        assert!((0.0..=1.0).contains(&p));
    }
}

#[test]
fn singleton_blocks_are_noops_and_divide_cleanly() {
    let mut table = build(&[
        ("1", "b1", "t1", 1.0),
        ("2", "b2", "t2", -3.0),
        ("3", "b3", "t3", 2.0),
    ]);
    let name = permute(&mut table, 5);
    assert_eq!(table.permuted(&name).unwrap(), table.segment_ids());

    // With fixed labels the null pool is the observed means themselves.
    let pvals = find_pvalues(&mut table, 3).unwrap();
    let avg = pvals.column("A_avg_p").unwrap();
    for (got, want) in avg.iter().zip([2.0 / 3.0, 0.0, 1.0 / 3.0]) {
        assert!((got - want).abs() < 1e-12, "{got} != {want}");
    }
}

#[test]
fn compute_then_average_keeps_the_segment_index() {
    let mut table = two_by_three();
    let iterations = 8;
    let raw = compute_pvalues(&mut table, iterations).unwrap();
    let segments = raw.segments().to_vec();

    let averaged = average_pvalues(raw, iterations).unwrap();
    assert_eq!(averaged.segments(), segments.as_slice());
    assert_eq!(averaged.len(), 4);
    assert_eq!(averaged.column_names().collect::<Vec<_>>(), vec!["A", "A_avg_p"]);
    for i in 0..iterations {
        assert!(averaged.column(&pvalue_column("A", i)).is_none());
    }
}

#[test]
fn averaging_with_a_different_count_fails() {
    let mut table = two_by_three();
    let raw = compute_pvalues(&mut table, 2).unwrap();
    let err = average_pvalues(raw, 3).unwrap_err();
    assert!(matches!(err, SegpermError::MissingColumn { ref column } if column == "A_p_2"));
}

#[test]
fn runs_are_reproducible() {
    let mut first = two_by_three();
    let mut second = two_by_three();
    assert_eq!(
        find_pvalues(&mut first, 12).unwrap(),
        find_pvalues(&mut second, 12).unwrap()
    );
    assert_eq!(first, second);
}

#[test]
fn comparison_pools_every_block() {
    // Block b2 holds only tiny values; its segments are still compared
    // against the large means of b1.
    let mut table = build(&[
        ("1", "b1", "t1", 100.0),
        ("2", "b1", "t2", 90.0),
        ("3", "b2", "t3", 0.1),
        ("4", "b2", "t4", 0.2),
    ]);
    let pvals = find_pvalues(&mut table, 4).unwrap();
    let avg = pvals.column("A_avg_p").unwrap();
    // t3 = 0.1 is the smallest magnitude: every other pooled mean exceeds it.
    assert_eq!(avg[2], 0.75);
    // t1 = 100 is the largest: nothing exceeds it.
    assert_eq!(avg[0], 0.0);
}

#[test]
fn repeated_variable_is_rejected_before_running() {
    let records = vec![
        Household::new("1", "b1", "t1", vec![1.0, 1.0]),
        Household::new("2", "b1", "t2", vec![2.0, 2.0]),
    ];
    let err = HouseholdTable::from_records(Schema::new(vec!["A".into(), "A".into()]), &records)
        .unwrap_err();
    assert!(matches!(err, SegpermError::Config { .. }), "got {err}");
}
