//! Leaf validators used at the workflow-storage boundary.

use crate::core::{Validate, ValidationError, ValidatorMetadata};

/// Validates that a connection endpoint string has the `<node_id>:<port_name>`
/// shape the persistence layer requires (`InvalidPortFormat` in spec terms).
///
/// Both halves must be non-empty and the string must contain exactly one
/// `:` separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortFormat;

impl Validate for PortFormat {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let mut parts = input.splitn(2, ':');
        let node_id = parts.next().unwrap_or_default();
        let Some(port_name) = parts.next() else {
            return Err(ValidationError::new(
                "invalid_port_format",
                format!("'{input}' is not of the form <node_id>:<port_name>"),
            ));
        };
        if node_id.is_empty() || port_name.is_empty() || port_name.contains(':') {
            return Err(ValidationError::new(
                "invalid_port_format",
                format!("'{input}' is not of the form <node_id>:<port_name>"),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> ValidatorMetadata {
        ValidatorMetadata::new("PortFormat")
    }
}

pub fn port_format() -> PortFormat {
    PortFormat
}

/// Validates that a sort column is a member of a fixed allowlist
/// (`InvalidSortField` in spec terms).
#[derive(Debug, Clone)]
pub struct SortFieldAllowlist {
    allowed: &'static [&'static str],
}

impl Validate for SortFieldAllowlist {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        if self.allowed.contains(&input) {
            Ok(())
        } else {
            Err(ValidationError::new(
                "invalid_sort_field",
                format!(
                    "'{input}' is not a sortable field (allowed: {})",
                    self.allowed.join(", ")
                ),
            ))
        }
    }

    fn metadata(&self) -> ValidatorMetadata {
        ValidatorMetadata::new("SortFieldAllowlist")
    }
}

/// The workflow repository's `list` sort allowlist.
pub const WORKFLOW_SORT_FIELDS: &[&str] = &["created_at", "updated_at", "name"];

pub fn sort_field_allowlist(allowed: &'static [&'static str]) -> SortFieldAllowlist {
    SortFieldAllowlist { allowed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_format_accepts_node_colon_port() {
        assert!(port_format().validate("node1:success").is_ok());
    }

    #[test]
    fn port_format_rejects_missing_colon() {
        assert!(port_format().validate("node1").is_err());
    }

    #[test]
    fn port_format_rejects_empty_halves() {
        assert!(port_format().validate(":success").is_err());
        assert!(port_format().validate("node1:").is_err());
    }

    #[test]
    fn sort_field_allowlist_accepts_known_column() {
        let v = sort_field_allowlist(WORKFLOW_SORT_FIELDS);
        assert!(v.validate("created_at").is_ok());
        assert!(v.validate("name").is_ok());
    }

    #[test]
    fn sort_field_allowlist_rejects_unknown_column() {
        let v = sort_field_allowlist(WORKFLOW_SORT_FIELDS);
        let err = v.validate("password_hash").unwrap_err();
        assert_eq!(err.code.as_ref(), "invalid_sort_field");
    }
}
