//! The structured error every validator reports on failure.

use std::borrow::Cow;

/// A single validation failure.
///
/// `code` is a stable machine-readable identifier (`"min_length"`,
/// `"type_mismatch"`, `"path_not_found"`); `message` is human-readable;
/// `field` is the JSON-pointer path of the offending field, set by
/// `json_field`/`json_field_optional` as the error propagates outward.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: Cow<'static, str>,
    pub message: Cow<'static, str>,
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: Cow::Borrowed(code),
            message: message.into(),
            field: None,
        }
    }

    /// Returns a copy of this error with `field` set, used by `json_field`
    /// to annotate where in a document a failure occurred.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn min_length(field: &str, min: usize, actual: usize) -> Self {
        Self::new(
            "min_length",
            format!("expected at least {min} characters, got {actual}"),
        )
        .with_field_if_present(field)
    }

    pub fn max_length(field: &str, max: usize, actual: usize) -> Self {
        Self::new(
            "max_length",
            format!("expected at most {max} characters, got {actual}"),
        )
        .with_field_if_present(field)
    }

    pub fn type_mismatch(expected: &str) -> Self {
        Self::new("type_mismatch", format!("expected a {expected} value"))
    }

    pub fn path_not_found(pointer: &str) -> Self {
        Self::new("path_not_found", format!("field {pointer} is required")).with_field(pointer)
    }

    fn with_field_if_present(self, field: &str) -> Self {
        if field.is_empty() { self } else { self.with_field(field) }
    }
}
