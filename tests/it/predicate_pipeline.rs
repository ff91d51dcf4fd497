//! Cross-module invariants (spec.md §8) that only show up once a
//! predicate is driven across every batch of a row group, not just the
//! first one: NONE/ALL propagate to every batch, negation is involutive,
//! and `optimize` is idempotent and semantics-preserving.

use columnix::column::Column;
use columnix::predicate::{IndexMatch, Predicate};
use columnix::row_group::RowGroup;
use columnix::value::{ColumnType, Encoding};

fn row_group_of(values: &[i32]) -> RowGroup<'static> {
    let mut col = Column::new(ColumnType::I32, Encoding::None);
    for &v in values {
        col.put_i32(v).unwrap();
    }
    let mut rg = RowGroup::new();
    rg.add_column(col).unwrap();
    rg
}

fn all_masks(mut predicate: Predicate, rg: &RowGroup<'_>) -> Vec<(u64, usize)> {
    let mut cursor = rg.cursor();
    let mut masks = Vec::new();
    while let Some((mask, count)) = predicate.match_rows(rg, &mut cursor).unwrap() {
        masks.push((mask, count));
    }
    masks
}

fn full_mask(count: usize) -> u64 {
    if count >= 64 {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

#[test]
fn index_match_none_yields_zero_mask_on_every_batch() {
    let values: Vec<i32> = (0..150).collect();
    let rg = row_group_of(&values);
    let predicate = Predicate::new_i32_lt(0, 0);
    assert_eq!(predicate.match_indexes(&rg).unwrap(), IndexMatch::None);
    for (mask, _) in all_masks(predicate, &rg) {
        assert_eq!(mask, 0);
    }
}

#[test]
fn index_match_all_yields_full_mask_on_every_batch() {
    let values = vec![7i32; 150];
    let rg = row_group_of(&values);
    let predicate = Predicate::new_i32_eq(0, 7);
    assert_eq!(predicate.match_indexes(&rg).unwrap(), IndexMatch::All);
    for (mask, count) in all_masks(predicate, &rg) {
        assert_eq!(mask, full_mask(count));
    }
}

#[test]
fn double_negation_reproduces_original_mask_every_batch() {
    let values: Vec<i32> = (0..200).map(|i| i % 37).collect();
    let rg = row_group_of(&values);

    let base = Predicate::new_i32_lt(0, 20);
    let double_negated = Predicate::new_i32_lt(0, 20).negate().negate();

    let base_masks = all_masks(base, &rg);
    let negated_masks = all_masks(double_negated, &rg);
    assert_eq!(base_masks, negated_masks);
}

#[test]
fn optimize_is_idempotent_and_preserves_semantics() {
    let values: Vec<i32> = (0..200).collect();
    let rg = row_group_of(&values);

    let mut once = Predicate::and(vec![
        Predicate::new_i32_lt(0, 150),
        Predicate::new_i32_gt(0, 50),
    ]);
    once.optimize();
    let masks_once = all_masks(once, &rg);

    let mut twice = Predicate::and(vec![
        Predicate::new_i32_lt(0, 150),
        Predicate::new_i32_gt(0, 50),
    ]);
    twice.optimize();
    twice.optimize();
    let masks_twice = all_masks(twice, &rg);

    assert_eq!(masks_once, masks_twice);

    let unoptimized_masks = all_masks(
        Predicate::and(vec![
            Predicate::new_i32_lt(0, 150),
            Predicate::new_i32_gt(0, 50),
        ]),
        &rg,
    );
    assert_eq!(masks_once, unoptimized_masks);
}

#[test]
fn or_short_circuits_to_full_mask_without_evaluating_every_child() {
    // a TRUE child makes every batch fully set; the second child
    // references an out-of-range column, which would surface as an
    // `IndexOutOfRange` error from `eval_rows` if it were ever reached —
    // a passing test (no panic in `all_masks`'s `unwrap()`) proves the
    // short-circuit fired before that child was evaluated.
    let values: Vec<i32> = (0..70).collect();
    let rg = row_group_of(&values);
    let predicate = Predicate::or(vec![Predicate::new_true(), Predicate::new_i32_eq(99, 0)]);
    for (mask, count) in all_masks(predicate, &rg) {
        assert_eq!(mask, full_mask(count));
    }
}

#[test]
fn and_short_circuits_to_zero_mask_without_evaluating_every_child() {
    let values: Vec<i32> = (0..70).collect();
    let rg = row_group_of(&values);
    let predicate = Predicate::and(vec![Predicate::new_i32_lt(0, 0), Predicate::new_i32_eq(99, 0)]);
    for (mask, _) in all_masks(predicate, &rg) {
        assert_eq!(mask, 0);
    }
}
