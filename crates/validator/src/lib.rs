//! # Nebula Validator
//!
//! A small composable validation framework: a `Validate` trait with
//! `and`/`or`/`not` combinators, plus the leaf validators the workflow
//! engine needs at its storage boundary (port-format, sort-column
//! allowlist).

#![forbid(unsafe_code)]

pub mod combinators;
pub mod core;
pub mod validators;

pub mod prelude {
    pub use crate::combinators::{And, Not, Or, and_all, not};
    pub use crate::core::{Validate, ValidateExt, ValidationComplexity, ValidationError, ValidatorMetadata};
    pub use crate::validators::{PortFormat, SortFieldAllowlist, port_format, sort_field_allowlist};
}
