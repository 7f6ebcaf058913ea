//! PostgreSQL-backed repositories, gated behind the `postgres` feature.
//!
//! Queries are built with raw `sqlx::query` (not the `query!` macro,
//! which would need a live database at compile time) and rows are read
//! with `Row::try_get`, following the same pattern as the teacher's
//! `nebula-credential` Postgres store.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use nebula_core::{
    ConnectionId, ExecutionContext, ExecutionId, ExecutionStatus, NodeInputState, NodeResult,
    WorkflowGroupId, WorkflowId,
};
use nebula_validator::core::Validate;
use nebula_validator::validators::{port_format, sort_field_allowlist, WORKFLOW_SORT_FIELDS};
use nebula_workflow::{Connection, NodeCategory, Position, Workflow, WorkflowNode, WorkflowStatus};
use sqlx::{PgPool, Row};

use crate::error::StorageError;
use crate::filter::{Paging, Sort, SortDirection, WorkflowFilter};
use crate::traits::{
    ConnectionRepository, ExecutionContextRepository, InputCoordinationRepository, NodeRepository,
    Result, WorkflowRepository,
};

fn backend_err(operation: &str, source: sqlx::Error) -> StorageError {
    StorageError::Backend(format!("{operation}: {source}"))
}

fn status_str(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Draft => "draft",
        WorkflowStatus::Published => "published",
        WorkflowStatus::Unpublished => "unpublished",
        WorkflowStatus::Inactive => "inactive",
    }
}

fn parse_status(value: &str) -> WorkflowStatus {
    match value {
        "published" => WorkflowStatus::Published,
        "unpublished" => WorkflowStatus::Unpublished,
        "inactive" => WorkflowStatus::Inactive,
        _ => WorkflowStatus::Draft,
    }
}

fn category_str(category: NodeCategory) -> &'static str {
    match category {
        NodeCategory::Trigger => "trigger",
        NodeCategory::Action => "action",
        NodeCategory::Control => "control",
    }
}

fn parse_category(value: &str) -> NodeCategory {
    match value {
        "trigger" => NodeCategory::Trigger,
        "control" => NodeCategory::Control,
        _ => NodeCategory::Action,
    }
}

fn execution_status_str(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Cancelled => "cancelled",
    }
}

fn parse_execution_status(value: &str) -> ExecutionStatus {
    match value {
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        "cancelled" => ExecutionStatus::Cancelled,
        _ => ExecutionStatus::Running,
    }
}

/// Postgres-backed store. One pool shared by all five repository traits,
/// same as the in-memory store shares one map per entity.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the crate's bundled migrations against `pool`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn load_nodes(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowNode>> {
        let rows = sqlx::query(
            "SELECT node_id, node_type, category, name, config, enabled, position_x, \
             position_y, source_id, provider_id, event_type FROM workflow_nodes \
             WHERE workflow_id = $1",
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend_err("load_nodes", e))?;

        rows.into_iter()
            .map(|row| {
                let node_type: String = row.try_get("node_type").map_err(|e| backend_err("load_nodes", e))?;
                Ok(WorkflowNode {
                    id: row.try_get("node_id").map_err(|e| backend_err("load_nodes", e))?,
                    node_type: nebula_core::NodeTypeKey::new(node_type)
                        .map_err(|e| StorageError::Backend(e.to_string()))?,
                    category: parse_category(&row.try_get::<String, _>("category").map_err(|e| backend_err("load_nodes", e))?),
                    name: row.try_get("name").map_err(|e| backend_err("load_nodes", e))?,
                    config: row.try_get("config").map_err(|e| backend_err("load_nodes", e))?,
                    enabled: row.try_get("enabled").map_err(|e| backend_err("load_nodes", e))?,
                    position: Position {
                        x: row.try_get("position_x").map_err(|e| backend_err("load_nodes", e))?,
                        y: row.try_get("position_y").map_err(|e| backend_err("load_nodes", e))?,
                    },
                    source_id: row.try_get("source_id").map_err(|e| backend_err("load_nodes", e))?,
                    provider_id: row.try_get("provider_id").map_err(|e| backend_err("load_nodes", e))?,
                    event_type: row.try_get("event_type").map_err(|e| backend_err("load_nodes", e))?,
                })
            })
            .collect()
    }

    async fn load_connections(&self, workflow_id: WorkflowId) -> Result<Vec<Connection>> {
        let rows = sqlx::query("SELECT id, source_port, target_port FROM workflow_connections WHERE workflow_id = $1")
            .bind(workflow_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("load_connections", e))?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(|e| backend_err("load_connections", e))?;
                Ok(Connection {
                    id: ConnectionId::parse(&id).map_err(|e| StorageError::Backend(e.to_string()))?,
                    source_port: row.try_get("source_port").map_err(|e| backend_err("load_connections", e))?,
                    target_port: row.try_get("target_port").map_err(|e| backend_err("load_connections", e))?,
                })
            })
            .collect()
    }

    async fn row_to_workflow(&self, row: &sqlx::postgres::PgRow) -> Result<Workflow> {
        let id: String = row.try_get("id").map_err(|e| backend_err("row_to_workflow", e))?;
        let id = WorkflowId::parse(&id).map_err(|e| StorageError::Backend(e.to_string()))?;
        let group_id: String = row.try_get("workflow_group_id").map_err(|e| backend_err("row_to_workflow", e))?;
        let status: String = row.try_get("status").map_err(|e| backend_err("row_to_workflow", e))?;

        Ok(Workflow {
            id,
            workflow_group_id: WorkflowGroupId::parse(&group_id).map_err(|e| StorageError::Backend(e.to_string()))?,
            status: parse_status(&status),
            name: row.try_get("name").map_err(|e| backend_err("row_to_workflow", e))?,
            description: row.try_get("description").map_err(|e| backend_err("row_to_workflow", e))?,
            variables: row.try_get("variables").map_err(|e| backend_err("row_to_workflow", e))?,
            metadata: row.try_get("metadata").map_err(|e| backend_err("row_to_workflow", e))?,
            owner: row.try_get("owner").map_err(|e| backend_err("row_to_workflow", e))?,
            nodes: self.load_nodes(id).await?,
            connections: self.load_connections(id).await?,
            created_at: row.try_get("created_at").map_err(|e| backend_err("row_to_workflow", e))?,
            updated_at: row.try_get("updated_at").map_err(|e| backend_err("row_to_workflow", e))?,
            published_at: row.try_get("published_at").map_err(|e| backend_err("row_to_workflow", e))?,
            deleted_at: row.try_get("deleted_at").map_err(|e| backend_err("row_to_workflow", e))?,
        })
    }
}

#[async_trait]
impl WorkflowRepository for PostgresStore {
    async fn save(&self, workflow: Workflow) -> Result<Workflow> {
        sqlx::query(
            "INSERT INTO workflows (id, workflow_group_id, status, name, description, \
             variables, metadata, owner, created_at, updated_at, published_at, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, name = EXCLUDED.name, \
             description = EXCLUDED.description, variables = EXCLUDED.variables, \
             metadata = EXCLUDED.metadata, updated_at = EXCLUDED.updated_at, \
             published_at = EXCLUDED.published_at, deleted_at = EXCLUDED.deleted_at",
        )
        .bind(workflow.id.to_string())
        .bind(workflow.workflow_group_id.to_string())
        .bind(status_str(workflow.status))
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(serde_json::to_value(&workflow.variables).unwrap_or_default())
        .bind(serde_json::to_value(&workflow.metadata).unwrap_or_default())
        .bind(&workflow.owner)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .bind(workflow.published_at)
        .bind(workflow.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("save", e))?;

        for node in &workflow.nodes {
            self.save_node(workflow.id, node.clone()).await?;
        }
        for connection in &workflow.connections {
            self.save_connection(workflow.id, connection.clone()).await?;
        }
        Ok(workflow)
    }

    async fn get_by_id(&self, id: WorkflowId) -> Result<Workflow> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get_by_id", e))?
            .ok_or(StorageError::WorkflowNotFound { id })?;
        self.row_to_workflow(&row).await
    }

    async fn get_current(&self, group_id: WorkflowGroupId) -> Result<Workflow> {
        let row = sqlx::query(
            "SELECT * FROM workflows WHERE workflow_group_id = $1 AND deleted_at IS NULL \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend_err("get_current", e))?
        .ok_or(StorageError::WorkflowNotFound { id: WorkflowId::nil() })?;
        self.row_to_workflow(&row).await
    }

    async fn get_draft(&self, group_id: WorkflowGroupId) -> Result<Workflow> {
        let row = sqlx::query(
            "SELECT * FROM workflows WHERE workflow_group_id = $1 AND status = 'draft' \
             AND deleted_at IS NULL ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend_err("get_draft", e))?
        .ok_or(StorageError::WorkflowNotFound { id: WorkflowId::nil() })?;
        self.row_to_workflow(&row).await
    }

    async fn get_published(&self, group_id: WorkflowGroupId) -> Result<Workflow> {
        let row = sqlx::query(
            "SELECT * FROM workflows WHERE workflow_group_id = $1 AND status = 'published' \
             AND deleted_at IS NULL LIMIT 1",
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend_err("get_published", e))?
        .ok_or(StorageError::WorkflowNotFound { id: WorkflowId::nil() })?;
        self.row_to_workflow(&row).await
    }

    async fn list(&self, filter: WorkflowFilter, paging: Paging, sort: Sort) -> Result<Vec<Workflow>> {
        sort_field_allowlist(WORKFLOW_SORT_FIELDS)
            .validate(sort.field.as_str())
            .map_err(|source| StorageError::InvalidSortField { field: sort.field.clone(), source })?;

        let direction = match sort.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        // `sort.field` is checked against the allowlist above, so it is
        // safe to interpolate into the ORDER BY clause (sqlx has no
        // bind-parameter support for identifiers).
        let query = format!(
            "SELECT * FROM workflows WHERE deleted_at IS NULL \
             AND ($1::uuid IS NULL OR workflow_group_id = $1) \
             AND ($2::text IS NULL OR status = $2) \
             AND ($3::text IS NULL OR owner = $3) \
             ORDER BY {} {direction} OFFSET $4 LIMIT $5",
            sort.field
        );

        let rows = sqlx::query(&query)
            .bind(filter.workflow_group_id.map(|g| g.to_string()))
            .bind(filter.status.map(status_str))
            .bind(filter.owner)
            .bind(paging.offset as i64)
            .bind(paging.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("list", e))?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            workflows.push(self.row_to_workflow(&row).await?);
        }
        Ok(workflows)
    }

    async fn delete(&self, id: WorkflowId) -> Result<()> {
        sqlx::query("UPDATE workflows SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| backend_err("delete", e))?;
        Ok(())
    }

    async fn publish(&self, id: WorkflowId) -> Result<Workflow> {
        let target = self.get_by_id(id).await?;
        nebula_workflow::validate_for_publish(&target).map_err(|err| match err {
            nebula_workflow::WorkflowError::EmptyWorkflow => StorageError::EmptyWorkflow,
            nebula_workflow::WorkflowError::NoTriggerNode => StorageError::NoTriggerNode,
            nebula_workflow::WorkflowError::DanglingConnection { .. } => StorageError::DanglingConnection,
        })?;

        let mut tx = self.pool.begin().await.map_err(|e| backend_err("publish", e))?;
        sqlx::query(
            "UPDATE workflows SET status = 'unpublished' WHERE workflow_group_id = $1 AND status = 'published'",
        )
        .bind(target.workflow_group_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| backend_err("publish/demote", e))?;

        sqlx::query("UPDATE workflows SET status = 'published', published_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(target.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| backend_err("publish/promote", e))?;

        tx.commit().await.map_err(|e| backend_err("publish/commit", e))?;
        self.get_by_id(id).await
    }
}

#[async_trait]
impl NodeRepository for PostgresStore {
    async fn save_node(&self, workflow_id: WorkflowId, node: WorkflowNode) -> Result<()> {
        sqlx::query(
            "INSERT INTO workflow_nodes (workflow_id, node_id, node_type, category, name, \
             config, enabled, position_x, position_y, source_id, provider_id, event_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (workflow_id, node_id) DO UPDATE SET node_type = EXCLUDED.node_type, \
             category = EXCLUDED.category, name = EXCLUDED.name, config = EXCLUDED.config, \
             enabled = EXCLUDED.enabled, position_x = EXCLUDED.position_x, \
             position_y = EXCLUDED.position_y, source_id = EXCLUDED.source_id, \
             provider_id = EXCLUDED.provider_id, event_type = EXCLUDED.event_type",
        )
        .bind(workflow_id.to_string())
        .bind(&node.id)
        .bind(node.node_type.as_str())
        .bind(category_str(node.category))
        .bind(&node.name)
        .bind(&node.config)
        .bind(node.enabled)
        .bind(node.position.x)
        .bind(node.position.y)
        .bind(&node.source_id)
        .bind(&node.provider_id)
        .bind(&node.event_type)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("save_node", e))?;
        Ok(())
    }

    async fn get_node(&self, workflow_id: WorkflowId, node_id: &str) -> Result<WorkflowNode> {
        self.load_nodes(workflow_id)
            .await?
            .into_iter()
            .find(|n| n.id == node_id)
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })
    }

    async fn get_nodes(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowNode>> {
        self.load_nodes(workflow_id).await
    }

    async fn find_trigger_nodes(
        &self,
        source_id: &str,
        event_type: &str,
        provider_id: &str,
        status: WorkflowStatus,
    ) -> Result<Vec<(WorkflowId, WorkflowNode)>> {
        let rows = sqlx::query(
            "SELECT n.workflow_id, n.node_id, n.node_type, n.category, n.name, n.config, \
             n.enabled, n.position_x, n.position_y, n.source_id, n.provider_id, n.event_type \
             FROM workflow_nodes n JOIN workflows w ON w.id = n.workflow_id \
             WHERE n.category = 'trigger' AND n.source_id = $1 AND n.event_type = $2 \
             AND n.provider_id = $3 AND w.status = $4 AND w.deleted_at IS NULL",
        )
        .bind(source_id)
        .bind(event_type)
        .bind(provider_id)
        .bind(status_str(status))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend_err("find_trigger_nodes", e))?;

        rows.into_iter()
            .map(|row| {
                let workflow_id: String = row.try_get("workflow_id").map_err(|e| backend_err("find_trigger_nodes", e))?;
                let workflow_id = WorkflowId::parse(&workflow_id).map_err(|e| StorageError::Backend(e.to_string()))?;
                let node_type: String = row.try_get("node_type").map_err(|e| backend_err("find_trigger_nodes", e))?;
                let node = WorkflowNode {
                    id: row.try_get("node_id").map_err(|e| backend_err("find_trigger_nodes", e))?,
                    node_type: nebula_core::NodeTypeKey::new(node_type).map_err(|e| StorageError::Backend(e.to_string()))?,
                    category: NodeCategory::Trigger,
                    name: row.try_get("name").map_err(|e| backend_err("find_trigger_nodes", e))?,
                    config: row.try_get("config").map_err(|e| backend_err("find_trigger_nodes", e))?,
                    enabled: row.try_get("enabled").map_err(|e| backend_err("find_trigger_nodes", e))?,
                    position: Position {
                        x: row.try_get("position_x").map_err(|e| backend_err("find_trigger_nodes", e))?,
                        y: row.try_get("position_y").map_err(|e| backend_err("find_trigger_nodes", e))?,
                    },
                    source_id: row.try_get("source_id").map_err(|e| backend_err("find_trigger_nodes", e))?,
                    provider_id: row.try_get("provider_id").map_err(|e| backend_err("find_trigger_nodes", e))?,
                    event_type: row.try_get("event_type").map_err(|e| backend_err("find_trigger_nodes", e))?,
                };
                Ok((workflow_id, node))
            })
            .collect()
    }
}

#[async_trait]
impl ConnectionRepository for PostgresStore {
    async fn save_connection(&self, workflow_id: WorkflowId, connection: Connection) -> Result<()> {
        port_format()
            .validate(connection.source_port.as_str())
            .map_err(|source| StorageError::InvalidPortFormat { port: connection.source_port.clone(), source })?;
        port_format()
            .validate(connection.target_port.as_str())
            .map_err(|source| StorageError::InvalidPortFormat { port: connection.target_port.clone(), source })?;

        sqlx::query(
            "INSERT INTO workflow_connections (id, workflow_id, source_port, target_port) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO UPDATE SET source_port = EXCLUDED.source_port, \
             target_port = EXCLUDED.target_port",
        )
        .bind(connection.id.to_string())
        .bind(workflow_id.to_string())
        .bind(&connection.source_port)
        .bind(&connection.target_port)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("save_connection", e))?;
        Ok(())
    }

    async fn get_outgoing(&self, workflow_id: WorkflowId, source_node_id: &str) -> Result<Vec<Connection>> {
        Ok(self
            .load_connections(workflow_id)
            .await?
            .into_iter()
            .filter(|c| c.source_node_id() == Some(source_node_id))
            .collect())
    }

    async fn get_incoming(&self, workflow_id: WorkflowId, target_node_id: &str) -> Result<Vec<Connection>> {
        Ok(self
            .load_connections(workflow_id)
            .await?
            .into_iter()
            .filter(|c| c.target_node_id() == Some(target_node_id))
            .collect())
    }

    async fn get_all(&self, workflow_id: WorkflowId) -> Result<Vec<Connection>> {
        self.load_connections(workflow_id).await
    }

    async fn delete_connection(&self, workflow_id: WorkflowId, connection_id: ConnectionId) -> Result<()> {
        sqlx::query("DELETE FROM workflow_connections WHERE workflow_id = $1 AND id = $2")
            .bind(workflow_id.to_string())
            .bind(connection_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| backend_err("delete_connection", e))?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionContextRepository for PostgresStore {
    async fn save(&self, context: ExecutionContext) -> Result<()> {
        sqlx::query(
            "INSERT INTO execution_contexts (id, published_workflow_id, status, trigger_data, \
             variables, node_results, metadata, error_message, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, \
             node_results = EXCLUDED.node_results, metadata = EXCLUDED.metadata, \
             error_message = EXCLUDED.error_message, completed_at = EXCLUDED.completed_at",
        )
        .bind(context.id.to_string())
        .bind(context.published_workflow_id.to_string())
        .bind(execution_status_str(context.status))
        .bind(&context.trigger_data)
        .bind(serde_json::to_value(&context.variables).unwrap_or_default())
        .bind(serde_json::to_value(&context.node_results).unwrap_or_default())
        .bind(serde_json::to_value(&context.metadata).unwrap_or_default())
        .bind(&context.error_message)
        .bind(context.created_at)
        .bind(context.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("save", e))?;
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<ExecutionContext> {
        let row = sqlx::query("SELECT * FROM execution_contexts WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get", e))?
            .ok_or(StorageError::ExecutionNotFound { id: id.to_string() })?;
        row_to_execution_context(&row)
    }

    async fn list_by_workflow(&self, published_workflow_id: WorkflowId) -> Result<Vec<ExecutionContext>> {
        let rows = sqlx::query("SELECT * FROM execution_contexts WHERE published_workflow_id = $1")
            .bind(published_workflow_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("list_by_workflow", e))?;
        rows.iter().map(row_to_execution_context).collect()
    }

    async fn list_by_status(&self, status: ExecutionStatus) -> Result<Vec<ExecutionContext>> {
        let rows = sqlx::query("SELECT * FROM execution_contexts WHERE status = $1")
            .bind(execution_status_str(status))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("list_by_status", e))?;
        rows.iter().map(row_to_execution_context).collect()
    }
}

fn row_to_execution_context(row: &sqlx::postgres::PgRow) -> Result<ExecutionContext> {
    let id: String = row.try_get("id").map_err(|e| backend_err("row_to_execution_context", e))?;
    let workflow_id: String = row.try_get("published_workflow_id").map_err(|e| backend_err("row_to_execution_context", e))?;
    let status: String = row.try_get("status").map_err(|e| backend_err("row_to_execution_context", e))?;
    let variables: serde_json::Value = row.try_get("variables").map_err(|e| backend_err("row_to_execution_context", e))?;
    let node_results: serde_json::Value = row.try_get("node_results").map_err(|e| backend_err("row_to_execution_context", e))?;
    let metadata: serde_json::Value = row.try_get("metadata").map_err(|e| backend_err("row_to_execution_context", e))?;

    Ok(ExecutionContext {
        id: ExecutionId::parse(&id).map_err(|e| StorageError::Backend(e.to_string()))?,
        published_workflow_id: WorkflowId::parse(&workflow_id).map_err(|e| StorageError::Backend(e.to_string()))?,
        status: parse_execution_status(&status),
        trigger_data: row.try_get("trigger_data").map_err(|e| backend_err("row_to_execution_context", e))?,
        variables: serde_json::from_value(variables).unwrap_or_default(),
        node_results: serde_json::from_value::<HashMap<String, NodeResult>>(node_results).unwrap_or_default(),
        metadata: serde_json::from_value(metadata).unwrap_or_default(),
        error_message: row.try_get("error_message").map_err(|e| backend_err("row_to_execution_context", e))?,
        created_at: row.try_get("created_at").map_err(|e| backend_err("row_to_execution_context", e))?,
        completed_at: row.try_get("completed_at").map_err(|e| backend_err("row_to_execution_context", e))?,
    })
}

#[async_trait]
impl InputCoordinationRepository for PostgresStore {
    async fn save_state(&self, state: NodeInputState) -> Result<()> {
        sqlx::query(
            "INSERT INTO node_input_states (node_execution_id, node_id, execution_id, \
             received_inputs, requirements, created_at, last_updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (node_execution_id) DO UPDATE SET received_inputs = EXCLUDED.received_inputs, \
             last_updated_at = EXCLUDED.last_updated_at",
        )
        .bind(state.node_execution_id.to_string())
        .bind(&state.node_id)
        .bind(state.execution_id.to_string())
        .bind(serde_json::to_value(&state.received_inputs).unwrap_or_default())
        .bind(serde_json::to_value(&state.requirements).unwrap_or_default())
        .bind(state.created_at)
        .bind(state.last_updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("save_state", e))?;
        Ok(())
    }

    async fn load_state(&self, node_execution_id: uuid::Uuid) -> Result<NodeInputState> {
        let row = sqlx::query("SELECT * FROM node_input_states WHERE node_execution_id = $1")
            .bind(node_execution_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("load_state", e))?
            .ok_or(StorageError::InputStateNotFound { node_execution_id: node_execution_id.to_string() })?;
        row_to_input_state(&row)
    }

    async fn find_pending(&self, node_id: &str, execution_id: ExecutionId) -> Result<Option<NodeInputState>> {
        let row = sqlx::query(
            "SELECT * FROM node_input_states WHERE node_id = $1 AND execution_id = $2 \
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(node_id)
        .bind(execution_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend_err("find_pending", e))?;
        row.as_ref().map(row_to_input_state).transpose()
    }

    async fn delete_state(&self, node_execution_id: uuid::Uuid) -> Result<()> {
        sqlx::query("DELETE FROM node_input_states WHERE node_execution_id = $1")
            .bind(node_execution_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| backend_err("delete_state", e))?;
        Ok(())
    }

    async fn cleanup_expired(&self, max_age: std::time::Duration) -> Result<u64> {
        let age = chrono::Duration::from_std(max_age).unwrap_or_default();
        let max_cutoff = chrono::Utc::now() - age;
        let hard_cutoff = chrono::Utc::now() - age * 2;
        // Past `max_age`: reap only if the owning execution is still
        // running (or gone). Past `max_age * 2`: reap unconditionally —
        // a hard floor so a stuck "running" execution can't pin states
        // forever (spec §4.9 expiration).
        let result = sqlx::query(
            "DELETE FROM node_input_states nis WHERE nis.created_at < $1 \
             OR (nis.created_at < $2 AND COALESCE( \
                 (SELECT ec.status FROM execution_contexts ec WHERE ec.id = nis.execution_id), \
                 'running') = 'running')",
        )
        .bind(hard_cutoff)
        .bind(max_cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("cleanup_expired", e))?;
        let count = result.rows_affected();
        if count > 0 {
            tracing::info!(count, "swept expired node input states");
        }
        Ok(count)
    }
}

fn row_to_input_state(row: &sqlx::postgres::PgRow) -> Result<NodeInputState> {
    let node_execution_id: String = row.try_get("node_execution_id").map_err(|e| backend_err("row_to_input_state", e))?;
    let execution_id: String = row.try_get("execution_id").map_err(|e| backend_err("row_to_input_state", e))?;
    let received_inputs: serde_json::Value = row.try_get("received_inputs").map_err(|e| backend_err("row_to_input_state", e))?;
    let requirements: serde_json::Value = row.try_get("requirements").map_err(|e| backend_err("row_to_input_state", e))?;

    Ok(NodeInputState {
        node_id: row.try_get("node_id").map_err(|e| backend_err("row_to_input_state", e))?,
        execution_id: ExecutionId::parse(&execution_id).map_err(|e| StorageError::Backend(e.to_string()))?,
        node_execution_id: uuid::Uuid::from_str(&node_execution_id).map_err(|e| StorageError::Backend(e.to_string()))?,
        received_inputs: serde_json::from_value::<HashMap<String, NodeResult>>(received_inputs).unwrap_or_default(),
        requirements: serde_json::from_value(requirements).map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| backend_err("row_to_input_state", e))?,
        last_updated_at: row.try_get("last_updated_at").map_err(|e| backend_err("row_to_input_state", e))?,
    })
}
