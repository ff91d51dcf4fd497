//! Row-group cursor invariants (spec.md §8 invariant 2): the union of
//! per-batch row indices covers `[0, row_count)` with no repeats, and a
//! rewound cursor walks the same ground again.

use columnix::column::Column;
use columnix::row_group::{Batch, RowGroup};
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

fn walk(rg: &RowGroup<'_>) -> Vec<i32> {
    let mut cursor = rg.cursor();
    let mut seen = Vec::new();
    while cursor.next() {
        let size = cursor.batch_size();
        match cursor.batch(0).unwrap() {
            Batch::I32(values, count) => {
                assert_eq!(*count, size);
                seen.extend_from_slice(&values[..*count]);
            }
            _ => panic!("wrong batch kind"),
        }
    }
    seen
}

#[test]
fn covers_every_row_exactly_once_for_various_lengths() {
    for len in [0usize, 1, 63, 64, 65, 127, 128, 129, 1000] {
        let values: Vec<i32> = (0..len as i32).collect();
        let rg = row_group_of(&values);
        assert_eq!(walk(&rg), values, "row count {}", len);
    }
}

#[test]
fn rewind_walks_the_same_ground_again() {
    let values: Vec<i32> = (0..300).collect();
    let rg = row_group_of(&values);
    let mut cursor = rg.cursor();
    let mut first_pass = Vec::new();
    while cursor.next() {
        if let Batch::I32(batch, count) = cursor.batch(0).unwrap() {
            first_pass.extend_from_slice(&batch[..*count]);
        }
    }
    cursor.rewind();
    let mut second_pass = Vec::new();
    while cursor.next() {
        if let Batch::I32(batch, count) = cursor.batch(0).unwrap() {
            second_pass.extend_from_slice(&batch[..*count]);
        }
    }
    assert_eq!(first_pass, second_pass);
    assert_eq!(first_pass, values);
}

#[test]
fn exhausted_cursor_stays_exhausted_until_rewound() {
    let rg = row_group_of(&[1, 2, 3]);
    let mut cursor = rg.cursor();
    assert!(cursor.next());
    assert!(!cursor.next());
    assert!(!cursor.next());
    cursor.rewind();
    assert!(cursor.next());
}
