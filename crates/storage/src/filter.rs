use nebula_core::WorkflowGroupId;
use nebula_workflow::WorkflowStatus;

/// Filter criteria for `WorkflowRepository::list`. All fields are
/// conjunctive (AND) when present.
#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    pub workflow_group_id: Option<WorkflowGroupId>,
    pub status: Option<WorkflowStatus>,
    pub owner: Option<String>,
}

/// Offset-based paging. `limit` is clamped to `MAX_PAGE_SIZE` by callers
/// building the query; the repository itself does not reject an
/// oversized page, it just never returns more rows than exist.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub offset: u64,
    pub limit: u64,
}

impl Paging {
    pub fn first(limit: u64) -> Self {
        Self { offset: 0, limit }
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A sort column plus direction. The column is validated against
/// `nebula_validator::validators::WORKFLOW_SORT_FIELDS` before use —
/// see `WorkflowRepository::list`.
#[derive(Debug, Clone)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self { field: "created_at".to_string(), direction: SortDirection::Descending }
    }
}
