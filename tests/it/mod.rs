//! Black-box integration tests assembled into a single `it` binary, the
//! way the teacher crate groups its own cross-module tests under
//! `tests/it/`.

mod boundary;
mod file_format;
mod predicate_pipeline;
mod row_group_cursor;
