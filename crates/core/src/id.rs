//! Unique identifiers for workflow-engine entities.
//!
//! This module provides strongly-typed UUID identifiers using
//! [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>` wrappers.
//! Each identifier type is parameterized by a unique domain marker,
//! providing compile-time type safety that prevents mixing different ID
//! types (an `ExecutionId` can never be passed where a `WorkflowId` is
//! expected).
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Entity identifiers — UUID-based, Copy, 16 bytes each.
define_uuid!(WorkflowIdDomain => WorkflowId);
define_uuid!(WorkflowGroupIdDomain => WorkflowGroupId);
define_uuid!(ExecutionIdDomain => ExecutionId);
define_uuid!(ConnectionIdDomain => ConnectionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_id_v4_creates_non_nil_uuid() {
        let id = WorkflowId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn workflow_group_id_v4_creates_non_nil_uuid() {
        let id = WorkflowGroupId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn execution_id_v4_creates_non_nil_uuid() {
        let id = ExecutionId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn connection_id_v4_creates_non_nil_uuid() {
        let id = ConnectionId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn id_nil_creates_zero_valued_uuid() {
        let id = WorkflowId::nil();
        assert!(id.is_nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn id_parse_valid_uuid_string_succeeds() {
        let id = WorkflowId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert!(!id.is_nil());
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn id_parse_invalid_string_returns_error() {
        let result = WorkflowId::parse("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn id_copy_semantics_both_copies_usable() {
        let id1 = ExecutionId::v4();
        let id2 = id1; // Copy, not move
        assert_eq!(id1, id2);
    }

    #[test]
    fn id_serde_json_roundtrip() {
        let id = ExecutionId::v4();
        let json = serde_json::to_string(&id).unwrap();
        let back: ExecutionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn different_id_types_are_incompatible() {
        // Verifies type safety at the type level — passing a WorkflowId
        // where an ExecutionId is expected would be a compile error.
        fn accepts_workflow(_id: WorkflowId) {}
        fn accepts_execution(_id: ExecutionId) {}

        accepts_workflow(WorkflowId::v4());
        accepts_execution(ExecutionId::v4());
    }

    #[test]
    fn id_ordering_is_consistent() {
        let a = WorkflowId::nil();
        let b = WorkflowId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert!(a < b);
    }

    #[test]
    fn id_hash_is_consistent() {
        use std::collections::HashSet;
        let id = ExecutionId::v4();
        let mut set = HashSet::new();
        set.insert(id);
        assert!(set.contains(&id));
    }
}
