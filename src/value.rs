//! The closed column type set (§3) and a borrowed value view used by the
//! custom-predicate extension point and by `ColumnCursor::batch_values`.

/// The closed set of column physical types. Corresponds to `cx_column_type`
/// / `zcs_column_type` in `original_source/lib/common.h` and
/// `include/types.h` (the two historical type enums are unified here, with
/// `F32`/`F64` always present per the canonical set in spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bit,
    I32,
    I64,
    F32,
    F64,
    Str,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ColumnType::Bit => "bit",
            ColumnType::I32 => "i32",
            ColumnType::I64 => "i64",
            ColumnType::F32 => "f32",
            ColumnType::F64 => "f64",
            ColumnType::Str => "str",
        };
        f.write_str(name)
    }
}

/// The closed encoding set. `None` is the only member the spec requires;
/// the discriminant is kept open-ended on purpose (`#[non_exhaustive]`)
/// since §3 reserves the slot for future run-length/dictionary encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Encoding {
    None,
}

/// The closed compression set applied to a serialized column blob (§3, §6).
/// Real codec behavior lives in [`crate::compression`]; this is just the
/// on-disk discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Lz4,
    Lz4Hc,
    Zstd,
}

impl Compression {
    pub(crate) fn from_u32(v: u32) -> crate::error::Result<Self> {
        Ok(match v {
            0 => Compression::None,
            1 => Compression::Lz4,
            2 => Compression::Lz4Hc,
            3 => Compression::Zstd,
            other => return Err(out_of_spec!("unknown compression discriminant {}", other)),
        })
    }

    pub(crate) fn to_u32(self) -> u32 {
        match self {
            Compression::None => 0,
            Compression::Lz4 => 1,
            Compression::Lz4Hc => 2,
            Compression::Zstd => 3,
        }
    }
}

use crate::error::out_of_spec;

/// `cx_str_location` (`original_source/lib/common.h`): which end of the
/// haystack a `STR_CONTAINS` predicate anchors its needle against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrLocation {
    Start,
    End,
    Any,
}

/// A single typed value, borrowed where possible. This is the shape the
/// `CUSTOM` predicate callback receives (`cx_index_match_rows_t` in
/// `original_source/lib/predicate.h` passes an untyped `const void *`
/// alongside the column's `cx_column_type`; here the type tag and the
/// value travel together instead).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Bit(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(&'a [u8]),
}

impl<'a> Value<'a> {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Bit(_) => ColumnType::Bit,
            Value::I32(_) => ColumnType::I32,
            Value::I64(_) => ColumnType::I64,
            Value::F32(_) => ColumnType::F32,
            Value::F64(_) => ColumnType::F64,
            Value::Str(_) => ColumnType::Str,
        }
    }
}
