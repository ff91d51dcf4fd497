//! Reproduces the boundary-scenario table verbatim (S1-S9): a single
//! 10-row `i32` column, `col0 = [0..9]`, plus a constant column `col4 = [5;10]`
//! used only by S7. Grounded on `original_source/test/predicate.c`'s fixture.

use columnix::column::Column;
use columnix::predicate::{IndexMatch, Predicate};
use columnix::row_group::RowGroup;
use columnix::value::{ColumnType, Encoding};

fn fixture() -> RowGroup<'static> {
    let mut col0 = Column::new(ColumnType::I32, Encoding::None);
    let mut col4 = Column::new(ColumnType::I32, Encoding::None);
    for v in 0..10i32 {
        col0.put_i32(v).unwrap();
        col4.put_i32(5).unwrap();
    }
    let mut rg = RowGroup::new();
    rg.add_column(col0).unwrap();
    for _ in 0..3 {
        // pad columns 1..3 so col4 really sits at index 4
        let mut filler = Column::new(ColumnType::I32, Encoding::None);
        for v in 0..10i32 {
            filler.put_i32(v).unwrap();
        }
        rg.add_column(filler).unwrap();
    }
    rg.add_column(col4).unwrap();
    rg
}

fn run(mut predicate: Predicate, rg: &RowGroup<'_>) -> u64 {
    let mut cursor = rg.cursor();
    let (mask, count) = predicate.match_rows(rg, &mut cursor).unwrap().unwrap();
    assert_eq!(count, 10);
    mask
}

#[test]
fn s1_lt_10() {
    let rg = fixture();
    assert_eq!(run(Predicate::new_i32_lt(0, 10), &rg), 0x3FF);
}

#[test]
fn s2_lt_0() {
    let rg = fixture();
    assert_eq!(run(Predicate::new_i32_lt(0, 0), &rg), 0x000);
}

#[test]
fn s3_eq_3() {
    let rg = fixture();
    assert_eq!(run(Predicate::new_i32_eq(0, 3), &rg), 0x008);
}

#[test]
fn s4_not_eq_3() {
    let rg = fixture();
    assert_eq!(run(Predicate::new_i32_eq(0, 3).negate(), &rg), 0x3F7);
}

#[test]
fn s5_and_gt_2_lt_8() {
    let rg = fixture();
    let p = Predicate::and(vec![
        Predicate::new_i32_gt(0, 2),
        Predicate::new_i32_lt(0, 8),
    ]);
    assert_eq!(run(p, &rg), 0x0F8);
}

#[test]
fn s6_or_lt_2_gt_8() {
    let rg = fixture();
    let p = Predicate::or(vec![
        Predicate::new_i32_lt(0, 2),
        Predicate::new_i32_gt(0, 8),
    ]);
    assert_eq!(run(p, &rg), 0x203);
}

#[test]
fn s7_constant_column_eq_is_all() {
    let rg = fixture();
    assert_eq!(
        Predicate::new_i32_eq(4, 5).match_indexes(&rg).unwrap(),
        IndexMatch::All
    );
}

#[test]
fn s8_eq_max_is_unknown() {
    let rg = fixture();
    assert_eq!(
        Predicate::new_i32_eq(0, 9).match_indexes(&rg).unwrap(),
        IndexMatch::Unknown
    );
}

#[test]
fn s9_eq_below_min_is_none() {
    let rg = fixture();
    assert_eq!(
        Predicate::new_i32_eq(0, -1).match_indexes(&rg).unwrap(),
        IndexMatch::None
    );
}
