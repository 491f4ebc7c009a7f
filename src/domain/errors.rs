//! Domain validation errors.

use std::fmt;

/// Errors that can occur during domain value object validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided ID is empty.
    EmptyId,

    /// The provided ID exceeds the maximum length.
    IdTooLong(usize),

    /// The provided index name violates search engine naming rules.
    InvalidIndexName(String),

    /// A field path in an update is malformed.
    InvalidPath(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "ID cannot be empty"),
            Self::IdTooLong(len) => write!(f, "ID too long ({} bytes)", len),
            Self::InvalidIndexName(name) => write!(f, "Invalid index name: {}", name),
            Self::InvalidPath(path) => write!(f, "Invalid field path: {}", path),
        }
    }
}

impl std::error::Error for ValidationError {}
