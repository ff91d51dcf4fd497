//! Predicate engine (§4.6, C6): a composable boolean expression tree over
//! row-group columns, evaluated in two phases — index pruning
//! (`match_indexes`) ahead of any scan, then per-batch row matching
//! (`match_rows`) driven by a [`RowGroupCursor`].
//!
//! Grounded on `original_source/lib/predicate.h`'s constructor set
//! (`cx_predicate_new_i32_eq` etc., each taking a `size_t` column index
//! rather than a name — SPEC_FULL.md supplemented feature 5) and on
//! `test/predicate.c`'s fixture, which this module's tests reproduce
//! almost verbatim. `match_indexes`'s per-node decision table and
//! `optimize`'s cost table are transcribed directly from spec.md §4.6.

use crate::error::{out_of_spec, Error, Result};
use crate::index::ColumnIndex;
use crate::kernel::{self, Cmp, StrCase};
use crate::row_group::{Batch, RowGroup, RowGroupCursor};
use crate::value::{ColumnType, StrLocation, Value};

/// Result of consulting a row group's indexes for a predicate, ahead of
/// any row scan (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMatch {
    All,
    None,
    Unknown,
}

impl IndexMatch {
    fn negate(self) -> IndexMatch {
        match self {
            IndexMatch::All => IndexMatch::None,
            IndexMatch::None => IndexMatch::All,
            IndexMatch::Unknown => IndexMatch::Unknown,
        }
    }
}

/// An owned comparison literal; the `CMP` node's type must match the
/// referenced column's type (checked by [`Predicate::valid`]).
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Bit(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(Vec<u8>, StrCase),
}

impl Literal {
    fn column_type(&self) -> ColumnType {
        match self {
            Literal::Bit(_) => ColumnType::Bit,
            Literal::I32(_) => ColumnType::I32,
            Literal::I64(_) => ColumnType::I64,
            Literal::F32(_) => ColumnType::F32,
            Literal::F64(_) => ColumnType::F64,
            Literal::Str(..) => ColumnType::Str,
        }
    }
}

/// A user-supplied index-pruning function for a `CUSTOM` node (the
/// `cx_index_match_index_t` function pointer in `original_source`,
/// expressed as a closure instead of a raw pointer + opaque `data`).
pub type CustomIndexFn = dyn Fn(ColumnType, &ColumnIndex) -> IndexMatch + Send + Sync;

/// A user-supplied row-matching function for a `CUSTOM` node (the
/// `cx_index_match_rows_t` function pointer in `original_source`). Gets
/// the batch materialized through [`Batch::to_values`] rather than an
/// untyped `const void *`. An `Err` here is fatal (§7: surfaced as
/// [`Error::UserCallbackFailure`]).
pub type CustomRowsFn = dyn FnMut(ColumnType, usize, &[Value<'_>]) -> Result<u64> + Send + Sync;

/// A user-extensible predicate leaf (§3 `CUSTOM(column, ...)`).
pub struct Custom {
    column: usize,
    column_type: ColumnType,
    cost: i64,
    index_fn: Option<Box<CustomIndexFn>>,
    rows_fn: Box<CustomRowsFn>,
}

impl std::fmt::Debug for Custom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Custom")
            .field("column", &self.column)
            .field("column_type", &self.column_type)
            .field("cost", &self.cost)
            .field("has_index_fn", &self.index_fn.is_some())
            .finish()
    }
}

/// The predicate expression tree (§3). Trees are built via the
/// constructors below, then typically passed through [`Predicate::optimize`]
/// once before repeated use against a row group's cursor.
#[derive(Debug)]
pub enum Predicate {
    True,
    /// `NULL(column)`: always false. The core never produces nulls
    /// (`ColumnIndex::null_count` is permanently 0), so this node is kept
    /// only as a structurally valid leaf for callers building predicate
    /// trees generically — see DESIGN.md's Open Question decision.
    Null(usize),
    Cmp {
        column: usize,
        op: Cmp,
        literal: Literal,
    },
    StrContains {
        column: usize,
        needle: Vec<u8>,
        case: StrCase,
        location: StrLocation,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Custom(Custom),
}

fn full_mask(count: usize) -> u64 {
    if count >= 64 {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

impl Predicate {
    pub fn new_true() -> Self {
        Predicate::True
    }

    pub fn new_null(column: usize) -> Self {
        Predicate::Null(column)
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And(children)
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or(children)
    }

    pub fn new_bit_eq(column: usize, value: bool) -> Self {
        Predicate::Cmp {
            column,
            op: Cmp::Eq,
            literal: Literal::Bit(value),
        }
    }

    pub fn new_i32_eq(column: usize, value: i32) -> Self {
        Self::numeric_cmp(column, Cmp::Eq, Literal::I32(value))
    }
    pub fn new_i32_lt(column: usize, value: i32) -> Self {
        Self::numeric_cmp(column, Cmp::Lt, Literal::I32(value))
    }
    pub fn new_i32_gt(column: usize, value: i32) -> Self {
        Self::numeric_cmp(column, Cmp::Gt, Literal::I32(value))
    }

    pub fn new_i64_eq(column: usize, value: i64) -> Self {
        Self::numeric_cmp(column, Cmp::Eq, Literal::I64(value))
    }
    pub fn new_i64_lt(column: usize, value: i64) -> Self {
        Self::numeric_cmp(column, Cmp::Lt, Literal::I64(value))
    }
    pub fn new_i64_gt(column: usize, value: i64) -> Self {
        Self::numeric_cmp(column, Cmp::Gt, Literal::I64(value))
    }

    pub fn new_f32_eq(column: usize, value: f32) -> Self {
        Self::numeric_cmp(column, Cmp::Eq, Literal::F32(value))
    }
    pub fn new_f32_lt(column: usize, value: f32) -> Self {
        Self::numeric_cmp(column, Cmp::Lt, Literal::F32(value))
    }
    pub fn new_f32_gt(column: usize, value: f32) -> Self {
        Self::numeric_cmp(column, Cmp::Gt, Literal::F32(value))
    }

    pub fn new_f64_eq(column: usize, value: f64) -> Self {
        Self::numeric_cmp(column, Cmp::Eq, Literal::F64(value))
    }
    pub fn new_f64_lt(column: usize, value: f64) -> Self {
        Self::numeric_cmp(column, Cmp::Lt, Literal::F64(value))
    }
    pub fn new_f64_gt(column: usize, value: f64) -> Self {
        Self::numeric_cmp(column, Cmp::Gt, Literal::F64(value))
    }

    fn numeric_cmp(column: usize, op: Cmp, literal: Literal) -> Self {
        Predicate::Cmp {
            column,
            op,
            literal,
        }
    }

    pub fn new_str_eq(column: usize, needle: impl Into<Vec<u8>>, case: StrCase) -> Self {
        Predicate::Cmp {
            column,
            op: Cmp::Eq,
            literal: Literal::Str(needle.into(), case),
        }
    }
    pub fn new_str_lt(column: usize, needle: impl Into<Vec<u8>>, case: StrCase) -> Self {
        Predicate::Cmp {
            column,
            op: Cmp::Lt,
            literal: Literal::Str(needle.into(), case),
        }
    }
    pub fn new_str_gt(column: usize, needle: impl Into<Vec<u8>>, case: StrCase) -> Self {
        Predicate::Cmp {
            column,
            op: Cmp::Gt,
            literal: Literal::Str(needle.into(), case),
        }
    }

    pub fn new_str_contains(
        column: usize,
        needle: impl Into<Vec<u8>>,
        case: StrCase,
        location: StrLocation,
    ) -> Self {
        Predicate::StrContains {
            column,
            needle: needle.into(),
            case,
            location,
        }
    }

    /// `cx_predicate_new_custom`: `rows_fn` is required, `index_fn` is
    /// optional (absent, the node always returns `Unknown` at the index
    /// phase — §4.6 "delegate to custom-index-function or return UNKNOWN").
    pub fn new_custom(
        column: usize,
        column_type: ColumnType,
        cost: i64,
        rows_fn: Box<CustomRowsFn>,
        index_fn: Option<Box<CustomIndexFn>>,
    ) -> Self {
        Predicate::Custom(Custom {
            column,
            column_type,
            cost,
            index_fn,
            rows_fn,
        })
    }

    /// Cost hint used by [`Self::optimize`] to reorder `AND`/`OR` children
    /// cheapest-first (§4.6).
    pub fn cost(&self) -> i64 {
        match self {
            Predicate::True | Predicate::Null(_) => 1,
            Predicate::Cmp { literal, .. } => match literal {
                Literal::Bit(_) => 4,
                Literal::Str(..) => 8,
                _ => 1,
            },
            Predicate::StrContains { .. } => 16,
            Predicate::Not(p) => p.cost(),
            Predicate::And(ps) | Predicate::Or(ps) => ps.iter().map(Predicate::cost).sum(),
            Predicate::Custom(c) => c.cost,
        }
    }

    /// Recursively checks that every leaf's column index is in range and
    /// that its operator/literal type matches the referenced column's
    /// type (§4.6).
    pub fn valid(&self, row_group: &RowGroup<'_>) -> bool {
        match self {
            Predicate::True => true,
            Predicate::Null(column) => *column < row_group.column_count(),
            Predicate::Cmp { column, literal, .. } => {
                matches!(row_group.column_type(*column), Ok(ty) if ty == literal.column_type())
            }
            Predicate::StrContains { column, .. } => {
                matches!(row_group.column_type(*column), Ok(ColumnType::Str))
            }
            Predicate::Custom(c) => {
                matches!(row_group.column_type(c.column), Ok(ty) if ty == c.column_type)
            }
            Predicate::Not(p) => p.valid(row_group),
            Predicate::And(ps) | Predicate::Or(ps) => ps.iter().all(|p| p.valid(row_group)),
        }
    }

    /// Top-down, cost-ascending reorder of every `AND`/`OR` node's
    /// children (§4.6); idempotent (invariant 5) since sorting an already
    /// sorted slice is a no-op under a stable sort with equal-cost ties.
    pub fn optimize(&mut self) {
        match self {
            Predicate::And(ps) | Predicate::Or(ps) => {
                for p in ps.iter_mut() {
                    p.optimize();
                }
                ps.sort_by_key(Predicate::cost);
            }
            Predicate::Not(p) => p.optimize(),
            _ => {}
        }
    }

    /// Index-match phase (§4.6 decision table). Short-circuits `AND` on
    /// the first `None` child and `OR` on the first `All` child.
    pub fn match_indexes(&self, row_group: &RowGroup<'_>) -> Result<IndexMatch> {
        Ok(match self {
            Predicate::True => IndexMatch::All,
            Predicate::Null(column) => {
                // no nulls ever exist in the core; guard the column
                // reference so an out-of-range index still errors.
                row_group.column_index(*column)?;
                IndexMatch::None
            }
            Predicate::Cmp { column, op, literal } => {
                match_indexes_cmp(row_group.column_index(*column)?, *op, literal)
            }
            Predicate::StrContains { .. } => IndexMatch::Unknown,
            Predicate::Custom(c) => match &c.index_fn {
                Some(f) => f(c.column_type, row_group.column_index(c.column)?),
                None => {
                    row_group.column_index(c.column)?;
                    IndexMatch::Unknown
                }
            },
            Predicate::Not(p) => p.match_indexes(row_group)?.negate(),
            Predicate::And(ps) => {
                let mut result = IndexMatch::All;
                for p in ps {
                    match p.match_indexes(row_group)? {
                        IndexMatch::None => return Ok(IndexMatch::None),
                        IndexMatch::Unknown => result = IndexMatch::Unknown,
                        IndexMatch::All => {}
                    }
                }
                result
            }
            Predicate::Or(ps) => {
                let mut result = IndexMatch::None;
                for p in ps {
                    match p.match_indexes(row_group)? {
                        IndexMatch::All => return Ok(IndexMatch::All),
                        IndexMatch::Unknown => result = IndexMatch::Unknown,
                        IndexMatch::None => {}
                    }
                }
                result
            }
        })
    }

    /// Rows phase (§4.6): advances `cursor` to its next batch and
    /// evaluates this predicate's mask over it. Returns `None` once the
    /// cursor is exhausted; otherwise `Some((mask, count))`. `row_group`
    /// is taken for API parity with `cx_index_match_rows` even though
    /// this implementation only needs the cursor.
    pub fn match_rows(
        &mut self,
        row_group: &RowGroup<'_>,
        cursor: &mut RowGroupCursor<'_, '_>,
    ) -> Result<Option<(u64, usize)>> {
        let _ = row_group;
        if !cursor.next() {
            return Ok(None);
        }
        let count = cursor.batch_size();
        let mask = self.eval_rows(cursor, count)?;
        Ok(Some((mask, count)))
    }

    fn eval_rows(&mut self, cursor: &mut RowGroupCursor<'_, '_>, count: usize) -> Result<u64> {
        let full = full_mask(count);
        Ok(match self {
            Predicate::True => full,
            Predicate::Null(_) => 0,
            Predicate::Cmp { column, op, literal } => {
                let batch = cursor.batch(*column)?;
                match_rows_cmp(batch, *op, literal)? & full
            }
            Predicate::StrContains {
                column,
                needle,
                case,
                location,
            } => {
                let batch = cursor.batch(*column)?;
                match batch {
                    Batch::Str(values) => {
                        kernel::match_str_contains(values, values.len(), needle, *case, *location)
                            & full
                    }
                    _ => return Err(out_of_spec!("STR_CONTAINS on a non-string column")),
                }
            }
            Predicate::Custom(c) => {
                let batch = cursor.batch(c.column)?;
                let values = batch.to_values();
                let n = values.len();
                (c.rows_fn)(c.column_type, n, &values)
                    .map_err(|_| Error::UserCallbackFailure)?
                    & full
            }
            Predicate::Not(p) => !p.eval_rows(cursor, count)? & full,
            Predicate::And(ps) => {
                let mut mask = full;
                for p in ps {
                    if mask == 0 {
                        break;
                    }
                    mask &= p.eval_rows(cursor, count)?;
                }
                mask
            }
            Predicate::Or(ps) => {
                let mut mask = 0u64;
                for p in ps {
                    if mask == full {
                        break;
                    }
                    mask |= p.eval_rows(cursor, count)?;
                }
                mask
            }
        })
    }

    /// Children of a logical node, for query inspection; leaves return
    /// an empty slice (§4.6 "operand introspection").
    pub fn operands(&self) -> &[Predicate] {
        match self {
            Predicate::And(ps) | Predicate::Or(ps) => ps,
            _ => &[],
        }
    }
}

fn match_indexes_cmp(index: &ColumnIndex, op: Cmp, literal: &Literal) -> IndexMatch {
    match (index, literal) {
        (ColumnIndex::Bit { true_count, false_count }, Literal::Bit(v)) => {
            debug_assert_eq!(op, Cmp::Eq, "bit columns only support eq");
            if *v {
                if *true_count == 0 {
                    IndexMatch::None
                } else if *false_count == 0 {
                    IndexMatch::All
                } else {
                    IndexMatch::Unknown
                }
            } else if *false_count == 0 {
                IndexMatch::None
            } else if *true_count == 0 {
                IndexMatch::All
            } else {
                IndexMatch::Unknown
            }
        }
        (ColumnIndex::I32 { min, max, .. }, Literal::I32(v)) => decide(op, *min, *max, *v),
        (ColumnIndex::I64 { min, max, .. }, Literal::I64(v)) => decide(op, *min, *max, *v),
        (ColumnIndex::F32 { min, max, .. }, Literal::F32(v)) => {
            decide_float(op, *min as f64, *max as f64, *v as f64)
        }
        (ColumnIndex::F64 { min, max, .. }, Literal::F64(v)) => {
            decide_float(op, *min, *max, *v)
        }
        (ColumnIndex::Str { min, max, .. }, Literal::Str(v, case)) => {
            // The index's min/max are tracked over raw, unfolded bytes
            // (§4.3); they only bound a case-*sensitive* comparison. A
            // case-insensitive CMP can't be pruned from them without
            // folding min/max too, which the index doesn't carry, so
            // fall back to a full scan rather than risk disagreeing
            // with `match_rows`'s folded comparison (§8 invariants 3/4).
            match case {
                StrCase::Sensitive => decide(op, min.as_slice(), max.as_slice(), v.as_slice()),
                StrCase::Insensitive => IndexMatch::Unknown,
            }
        }
        _ => IndexMatch::Unknown,
    }
}

/// §4.6's `EQ`/`LT`/`GT` index decision table, generic over any ordered
/// type (numeric min/max or lexically ordered string bytes).
fn decide<T: PartialOrd>(op: Cmp, min: T, max: T, v: T) -> IndexMatch {
    match op {
        Cmp::Eq => {
            if v < min || v > max {
                IndexMatch::None
            } else if min == max {
                // min == max == v, given the bounds check above
                IndexMatch::All
            } else {
                IndexMatch::Unknown
            }
        }
        Cmp::Lt => {
            if v > max {
                IndexMatch::All
            } else if v <= min {
                IndexMatch::None
            } else {
                IndexMatch::Unknown
            }
        }
        Cmp::Gt => {
            if v < min {
                IndexMatch::All
            } else if v >= max {
                IndexMatch::None
            } else {
                IndexMatch::Unknown
            }
        }
    }
}

/// Floating-point counterpart of [`decide`]. The running `min`/`max`
/// (§4.3) only ever track *ordered* observations — `f32`/`f64`'s
/// `min`/`max` return the non-NaN operand when one side is NaN — so a
/// NaN row can sit inside `[min, max]` without either bound moving.
/// That makes `Unknown`/`None` still provable from the bounds the same
/// way as `decide`, but never `All`: a hidden NaN row always disagrees
/// with `match_rows` at eval time (every comparison against NaN is
/// false), so a bounds check that would otherwise conclude `All`
/// degrades to `Unknown` here. A NaN literal itself can never make any
/// row match, so it resolves directly to `None`.
fn decide_float(op: Cmp, min: f64, max: f64, v: f64) -> IndexMatch {
    if v.is_nan() {
        return IndexMatch::None;
    }
    match op {
        Cmp::Eq => {
            if v < min || v > max {
                IndexMatch::None
            } else {
                IndexMatch::Unknown
            }
        }
        Cmp::Lt => {
            if v <= min {
                IndexMatch::None
            } else {
                IndexMatch::Unknown
            }
        }
        Cmp::Gt => {
            if v >= max {
                IndexMatch::None
            } else {
                IndexMatch::Unknown
            }
        }
    }
}

fn match_rows_cmp(batch: &Batch<'_>, op: Cmp, literal: &Literal) -> Result<u64> {
    Ok(match (batch, literal) {
        (Batch::Bit(word, n), Literal::Bit(v)) => {
            debug_assert_eq!(op, Cmp::Eq, "bit columns only support eq");
            let mask = if *v { *word } else { !*word };
            mask & full_mask(*n)
        }
        (Batch::I32(values, n), Literal::I32(v)) => kernel::match_i32(values, *n, op, *v),
        (Batch::I64(values, n), Literal::I64(v)) => kernel::match_i64(values, *n, op, *v),
        (Batch::F32(values, n), Literal::F32(v)) => kernel::match_f32(values, *n, op, *v),
        (Batch::F64(values, n), Literal::F64(v)) => kernel::match_f64(values, *n, op, *v),
        (Batch::Str(values), Literal::Str(needle, case)) => {
            kernel::match_str_cmp(values, values.len(), op, needle, *case)
        }
        _ => return Err(out_of_spec!("predicate literal type does not match column batch type")),
    })
}
