//! Crate-wide error type.
//!
//! Mirrors the previous `ParquetError`: a small enum with a manual
//! `Display` impl rather than a derive-macro error crate, plus a
//! `type_mismatch!`/`out_of_spec!` macro pair for building variants at
//! the call site.

/// The error taxonomy named in the specification this crate implements:
/// append/predicate failures distinguished by cause rather than a single
/// catch-all string.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    /// Allocator failure during append or predicate construction.
    OutOfMemory,
    /// Append or predicate construction against the wrong column type.
    TypeMismatch(String),
    /// Append attempted on an externally backed (read-only) column.
    Immutable,
    /// A predicate referenced a column index outside the row group.
    IndexOutOfRange(usize),
    /// A column was attached to a row group with a different row count.
    CountMismatch { expected: usize, got: usize },
    /// A custom predicate's user callback returned failure.
    UserCallbackFailure,
    /// Input violates the on-disk format in a way not covered above
    /// (bad magic, truncated footer, ...).
    OutOfSpec(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::OutOfMemory => write!(fmt, "allocation failure"),
            Error::TypeMismatch(message) => write!(fmt, "type mismatch: {}", message),
            Error::Immutable => write!(fmt, "column is externally backed and read-only"),
            Error::IndexOutOfRange(i) => write!(fmt, "column index {} out of range", i),
            Error::CountMismatch { expected, got } => write!(
                fmt,
                "row count mismatch: row group has {} rows, column has {}",
                expected, got
            ),
            Error::UserCallbackFailure => write!(fmt, "custom predicate callback failed"),
            Error::OutOfSpec(message) => write!(fmt, "out of spec: {}", message),
        }
    }
}

impl std::error::Error for Error {}

/// A specialized `Result` for this crate.
pub type Result<T> = std::result::Result<T, Error>;

macro_rules! type_mismatch {
    ($fmt:expr) => ($crate::error::Error::TypeMismatch($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::error::Error::TypeMismatch(format!($fmt, $($args),*)));
}

macro_rules! out_of_spec {
    ($fmt:expr) => ($crate::error::Error::OutOfSpec($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::error::Error::OutOfSpec(format!($fmt, $($args),*)));
}

pub(crate) use out_of_spec;
pub(crate) use type_mismatch;
