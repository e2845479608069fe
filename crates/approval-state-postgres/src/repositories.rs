use approval_core::{
    CoreError, IdentityProvider, NewWorkflow, RequestTypeId, RequestTypeRepository, Session,
    StepId, StepRecord, StepRepository, StepSource, StepType, UserId, WorkflowDefinition,
    WorkflowId, WorkflowRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

use crate::{store_error, PostgresConnection};

/// Primary step table
pub const PRIMARY_STEP_TABLE: &str = "workflow_steps";

/// Legacy step table consulted by loads until the primary table is written
pub const LEGACY_STEP_TABLE: &str = "approval_steps";

const MARK_WRITTEN: &str = "INSERT INTO step_table_writes (step_table, workflow_id) VALUES ($1, $2) \
     ON CONFLICT (step_table, workflow_id) DO UPDATE SET written_at = NOW()";

const STEP_COLUMNS: &str =
    "id, workflow_id, step_name, step_type, approver_id, is_required, step_order, instructions";

const WORKFLOW_COLUMNS: &str =
    "id, name, description, request_type_id, is_active, created_by, created_at";

fn decode_error(context: &str, e: sqlx::Error) -> CoreError {
    CoreError::SerializationError(format!("{}: {}", context, e))
}

fn workflow_from_row(row: &PgRow) -> Result<WorkflowDefinition, CoreError> {
    let decode = |e| decode_error("Error decoding workflow", e);

    Ok(WorkflowDefinition {
        id: WorkflowId(row.try_get::<Uuid, _>("id").map_err(decode)?),
        request_type_id: RequestTypeId(row.try_get("request_type_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        is_active: row.try_get("is_active").map_err(decode)?,
        created_by: row
            .try_get::<Option<String>, _>("created_by")
            .map_err(decode)?
            .map(UserId),
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(decode)?,
    })
}

fn step_from_row(row: &PgRow) -> Result<StepRecord, CoreError> {
    let decode = |e| decode_error("Error decoding step", e);
    let step_type: String = row.try_get("step_type").map_err(decode)?;

    Ok(StepRecord {
        id: StepId(row.try_get::<Uuid, _>("id").map_err(decode)?),
        workflow_id: WorkflowId(row.try_get::<Uuid, _>("workflow_id").map_err(decode)?),
        step_name: row.try_get("step_name").map_err(decode)?,
        step_type: step_type.parse::<StepType>()?,
        approver_id: row.try_get("approver_id").map_err(decode)?,
        is_required: row.try_get("is_required").map_err(decode)?,
        step_order: row.try_get("step_order").map_err(decode)?,
        instructions: row.try_get("instructions").map_err(decode)?,
    })
}

/// Postgres implementation of the WorkflowRepository
#[derive(Clone)]
pub struct PostgresWorkflowRepository {
    conn: PostgresConnection,
}

impl PostgresWorkflowRepository {
    /// Create a new Postgres workflow repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn find_latest_active(
        &self,
        request_type_id: &RequestTypeId,
    ) -> Result<Option<WorkflowDefinition>, CoreError> {
        let query = format!(
            "SELECT {} FROM workflows
             WHERE request_type_id = $1 AND is_active = TRUE
             ORDER BY created_at DESC
             LIMIT 1",
            WORKFLOW_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(&request_type_id.0)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to look up active workflow", e))?;

        row.as_ref().map(workflow_from_row).transpose()
    }

    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, CoreError> {
        let query = format!("SELECT {} FROM workflows WHERE id = $1", WORKFLOW_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id.0)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to load workflow", e))?;

        row.as_ref().map(workflow_from_row).transpose()
    }

    async fn create(&self, workflow: &NewWorkflow) -> Result<WorkflowDefinition, CoreError> {
        let query = format!(
            "INSERT INTO workflows (name, description, request_type_id, is_active, created_by)
             VALUES ($1, $2, $3, TRUE, $4)
             RETURNING {}",
            WORKFLOW_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(&workflow.name)
            .bind(&workflow.description)
            .bind(&workflow.request_type_id.0)
            .bind(workflow.created_by.as_ref().map(|u| u.0.as_str()))
            .fetch_one(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to create workflow", e))?;

        let created = workflow_from_row(&row)?;
        debug!(workflow_id = %created.id, "Inserted workflow row");
        Ok(created)
    }
}

/// Postgres implementation of the RequestTypeRepository
#[derive(Clone)]
pub struct PostgresRequestTypeRepository {
    conn: PostgresConnection,
}

impl PostgresRequestTypeRepository {
    /// Create a new Postgres request type repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RequestTypeRepository for PostgresRequestTypeRepository {
    async fn display_name(&self, id: &RequestTypeId) -> Result<Option<String>, CoreError> {
        let row = sqlx::query("SELECT name FROM request_types WHERE id = $1")
            .bind(&id.0)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to load request type", e))?;

        match row {
            Some(row) => row
                .try_get::<Option<String>, _>("name")
                .map_err(|e| decode_error("Error decoding request type", e)),
            None => Ok(None),
        }
    }

    async fn set_default_workflow(
        &self,
        id: &RequestTypeId,
        workflow_id: &WorkflowId,
    ) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE request_types SET default_workflow_id = $1 WHERE id = $2")
            .bind(workflow_id.0)
            .bind(&id.0)
            .execute(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to set default workflow", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Request type {}", id)));
        }
        Ok(())
    }
}

/// Postgres step table; the primary table is writable, the legacy one is read
/// through `StepSource`
#[derive(Clone)]
pub struct PostgresStepRepository {
    conn: PostgresConnection,
    table: &'static str,
}

impl PostgresStepRepository {
    /// Repository over the primary step table
    pub fn primary(conn: PostgresConnection) -> Self {
        Self {
            conn,
            table: PRIMARY_STEP_TABLE,
        }
    }

    /// Repository over the legacy step table
    pub fn legacy(conn: PostgresConnection) -> Self {
        Self {
            conn,
            table: LEGACY_STEP_TABLE,
        }
    }

    /// Table this repository reads and writes
    pub fn table(&self) -> &'static str {
        self.table
    }

    async fn select(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError> {
        let query = format!(
            "SELECT {} FROM {} WHERE workflow_id = $1 ORDER BY step_order",
            STEP_COLUMNS, self.table
        );

        let rows = sqlx::query(&query)
            .bind(workflow_id.0)
            .fetch_all(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to load steps", e))?;

        rows.iter().map(step_from_row).collect()
    }

    fn insert_query(&self, steps: &[StepRecord]) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            self.table, STEP_COLUMNS
        ));
        builder.push_values(steps.iter().cloned(), |mut row, step| {
            row.push_bind(step.id.0)
                .push_bind(step.workflow_id.0)
                .push_bind(step.step_name)
                .push_bind(step.step_type.as_str())
                .push_bind(step.approver_id)
                .push_bind(step.is_required)
                .push_bind(step.step_order)
                .push_bind(step.instructions);
        });
        builder
    }

    fn mark_written(&self, workflow_id: WorkflowId) -> Query<'static, Postgres, PgArguments> {
        sqlx::query(MARK_WRITTEN)
            .bind(self.table)
            .bind(workflow_id.0)
    }
}

#[async_trait]
impl StepRepository for PostgresStepRepository {
    async fn fetch_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError> {
        self.select(workflow_id).await
    }

    async fn delete_steps(&self, workflow_id: &WorkflowId) -> Result<u64, CoreError> {
        let mut tx = self
            .conn
            .pool()
            .begin()
            .await
            .map_err(|e| store_error("Failed to start step transaction", e))?;

        let query = format!("DELETE FROM {} WHERE workflow_id = $1", self.table);
        let removed = sqlx::query(&query)
            .bind(workflow_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to delete steps", e))?
            .rows_affected();

        self.mark_written(*workflow_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to record step write", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit step transaction", e))?;
        Ok(removed)
    }

    async fn insert_steps(&self, steps: &[StepRecord]) -> Result<(), CoreError> {
        if steps.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .conn
            .pool()
            .begin()
            .await
            .map_err(|e| store_error("Failed to start step transaction", e))?;

        let mut query = self.insert_query(steps);
        query
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to insert steps", e))?;

        let mut workflows: Vec<WorkflowId> = steps.iter().map(|step| step.workflow_id).collect();
        workflows.sort_by_key(|id| id.0);
        workflows.dedup();
        for workflow_id in workflows {
            self.mark_written(workflow_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| store_error("Failed to record step write", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit step transaction", e))?;
        Ok(())
    }

    async fn replace_steps(
        &self,
        workflow_id: &WorkflowId,
        steps: &[StepRecord],
    ) -> Result<(), CoreError> {
        let mut tx = self
            .conn
            .pool()
            .begin()
            .await
            .map_err(|e| store_error("Failed to start step transaction", e))?;

        let query = format!("DELETE FROM {} WHERE workflow_id = $1", self.table);
        let removed = sqlx::query(&query)
            .bind(workflow_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to delete steps", e))?
            .rows_affected();

        if !steps.is_empty() {
            // Dropping the transaction on error rolls back the delete
            let mut query = self.insert_query(steps);
            query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| store_error("Failed to insert steps", e))?;
        }

        self.mark_written(*workflow_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to record step write", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit step transaction", e))?;

        debug!(
            workflow_id = %workflow_id,
            removed,
            inserted = steps.len(),
            "Replaced step rows"
        );
        Ok(())
    }

    async fn has_written(&self, workflow_id: &WorkflowId) -> Result<bool, CoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM step_table_writes WHERE step_table = $1 AND workflow_id = $2) AS written",
        )
        .bind(self.table)
        .bind(workflow_id.0)
        .fetch_one(self.conn.pool())
        .await
        .map_err(|e| store_error("Failed to check step writes", e))?;

        row.try_get::<bool, _>("written")
            .map_err(|e| decode_error("Error decoding step write marker", e))
    }
}

#[async_trait]
impl StepSource for PostgresStepRepository {
    fn source_name(&self) -> &str {
        self.table
    }

    async fn read_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError> {
        self.select(workflow_id).await
    }
}

/// Role lookup against `user_roles`; the session is supplied by the host
#[derive(Clone)]
pub struct PostgresIdentityProvider {
    conn: PostgresConnection,
    current_user: Option<UserId>,
}

impl PostgresIdentityProvider {
    /// Create a provider for the given caller
    pub fn new(conn: PostgresConnection, current_user: Option<UserId>) -> Self {
        Self { conn, current_user }
    }
}

#[async_trait]
impl IdentityProvider for PostgresIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, CoreError> {
        Ok(self.current_user.clone().map(|user_id| Session { user_id }))
    }

    async fn user_roles(&self, user_id: &UserId) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
            .bind(&user_id.0)
            .fetch_all(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to load user roles", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("role")
                    .map_err(|e| decode_error("Error decoding role", e))
            })
            .collect()
    }
}
