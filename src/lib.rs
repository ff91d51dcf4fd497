//! Columnar storage core: typed column buffers, row groups, and a
//! predicate engine with index pruning and SIMD row matching.
//!
//! `unsafe` is confined to [`kernel`]'s architecture-specific SIMD
//! intrinsics, each gated behind a `#[target_feature(enable = "...")]`
//! function plus a runtime `is_x86_feature_detected!` check and a scalar
//! fallback that the kernel's own tests assert is bit-identical. Every
//! other module is safe code, so the crate denies `unsafe_code` at the
//! root (not `forbid`, which `kernel`'s module-level `allow` could not
//! override) and `kernel` opts back in locally — unsafe is the
//! exception here, not the default.
#![deny(unsafe_code)]

#[macro_use]
pub mod error;
pub mod column;
pub mod compression;
pub mod format;
pub mod index;
pub mod kernel;
pub mod predicate;
pub mod row_group;
pub mod value;

pub use column::{Column, ColumnCursor};
pub use error::{Error, Result};
pub use index::ColumnIndex;
pub use predicate::{IndexMatch, Predicate};
pub use row_group::{Batch, RowGroup, RowGroupCursor};
pub use value::{ColumnType, Compression, Encoding, StrLocation, Value};
