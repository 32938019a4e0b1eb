//------------ Error types ---------------------------------------------------
//
// One enum per operation, narrowed to the variants that operation can
// actually raise, in the hand-rolled `Display` style this codebase has
// always used for its error types rather than a derive macro.

use std::fmt;

/// Errors raised by the `create_*` constructors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CreateError {
    /// The initial arena allocation failed.
    OutOfMemory,
}

impl std::error::Error for CreateError {}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::OutOfMemory => {
                write!(f, "Error: could not allocate the initial arena.")
            }
        }
    }
}

/// Errors raised by `add`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddError {
    /// `prefix_len` exceeds the address family's maximum.
    BadPrefixLength,
    /// The node arena is exhausted (would exceed `CHILD_MASK` nodes).
    OutOfSpace,
    /// Growing the arena's backing storage failed.
    OutOfMemory,
}

impl std::error::Error for AddError {}

impl fmt::Display for AddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddError::BadPrefixLength => {
                write!(f, "Error: prefix length exceeds the address family's maximum.")
            }
            AddError::OutOfSpace => {
                write!(f, "Error: the node arena is exhausted.")
            }
            AddError::OutOfMemory => {
                write!(f, "Error: could not grow the node arena.")
            }
        }
    }
}

/// Errors raised by `delete`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeleteError {
    /// `prefix_len` exceeds the address family's maximum.
    BadPrefixLength,
    /// No such prefix is present in the table.
    NotFound,
}

impl std::error::Error for DeleteError {}

impl fmt::Display for DeleteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteError::BadPrefixLength => {
                write!(f, "Error: prefix length exceeds the address family's maximum.")
            }
            DeleteError::NotFound => {
                write!(f, "Error: the requested prefix is not present.")
            }
        }
    }
}
