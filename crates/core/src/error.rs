//! Shared error type for identifier and key parsing failures.

use thiserror::Error;

use crate::id::UuidParseError;
use domain_key::KeyParseError;

/// Errors shared across the workflow-engine crates for id/key handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A UUID-based identifier failed to parse.
    #[error("invalid id: {0}")]
    InvalidId(#[from] UuidParseError),

    /// A string-keyed identifier (node type, port name) failed to parse.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyParseError),
}
