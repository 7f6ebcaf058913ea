//! # Nebula Storage
//!
//! The persistence layer for the workflow engine: repository traits for
//! workflows, nodes, connections, execution contexts, and per-node input
//! coordination state, plus an in-memory implementation and an optional
//! `sqlx`-backed Postgres one (`postgres` feature).
//!
//! Every repository call returns a typed [`StorageError`]; callers
//! decide whether to retry. Soft-delete and `publish` are idempotent.

#![forbid(unsafe_code)]

pub mod error;
pub mod filter;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use error::StorageError;
pub use filter::{Paging, Sort, SortDirection, WorkflowFilter};
pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use traits::{
    ConnectionRepository, ExecutionContextRepository, InputCoordinationRepository, NodeRepository,
    Result, WorkflowRepository,
};
