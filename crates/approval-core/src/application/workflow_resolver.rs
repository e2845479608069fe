use std::sync::Arc;

use crate::domain::repository::{RequestTypeRepository, WorkflowRepository};
use crate::domain::workflow::{
    NewWorkflow, RequestTypeId, UserId, WorkflowDefinition, WorkflowRef,
};
use crate::CoreError;

/// Turns a request type into a persisted workflow, creating one lazily
pub struct WorkflowResolver {
    workflow_repo: Arc<dyn WorkflowRepository>,
    request_type_repo: Arc<dyn RequestTypeRepository>,
    name_suffix: String,
}

impl WorkflowResolver {
    /// Create a new workflow resolver
    pub fn new(
        workflow_repo: Arc<dyn WorkflowRepository>,
        request_type_repo: Arc<dyn RequestTypeRepository>,
    ) -> Self {
        Self {
            workflow_repo,
            request_type_repo,
            name_suffix: "Workflow".to_string(),
        }
    }

    /// Set the suffix used when naming created workflows
    pub fn with_name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.name_suffix = suffix.into();
        self
    }

    /// Return a persisted workflow for the request type.
    ///
    /// A cached persisted reference is returned as-is without I/O. Without a
    /// request type the result stays `Unsaved`. Otherwise the newest active
    /// workflow is adopted, or a new one is created and wired as the
    /// request type's default.
    pub async fn ensure_workflow_exists(
        &self,
        request_type_id: Option<&RequestTypeId>,
        cached: WorkflowRef,
        created_by: Option<&UserId>,
    ) -> Result<WorkflowRef, CoreError> {
        if let WorkflowRef::Persisted(_) = cached {
            return Ok(cached);
        }

        let request_type_id = match request_type_id {
            Some(id) => id,
            None => return Ok(WorkflowRef::Unsaved),
        };

        if let Some(existing) = self.lookup(request_type_id).await? {
            tracing::debug!(
                request_type_id = %request_type_id,
                workflow_id = %existing.id,
                "Adopting existing active workflow"
            );
            return Ok(WorkflowRef::Persisted(existing.id));
        }

        let created = self.create(request_type_id, created_by).await?;
        Ok(WorkflowRef::Persisted(created.id))
    }

    /// Look up the active workflow for a request type without creating one
    pub async fn find_active(
        &self,
        request_type_id: &RequestTypeId,
    ) -> Result<Option<WorkflowDefinition>, CoreError> {
        self.lookup(request_type_id).await
    }

    async fn lookup(
        &self,
        request_type_id: &RequestTypeId,
    ) -> Result<Option<WorkflowDefinition>, CoreError> {
        self.workflow_repo
            .find_latest_active(request_type_id)
            .await
            .map_err(resolution_error)
    }

    async fn create(
        &self,
        request_type_id: &RequestTypeId,
        created_by: Option<&UserId>,
    ) -> Result<WorkflowDefinition, CoreError> {
        let display_name = match self.request_type_repo.display_name(request_type_id).await {
            Ok(name) => name.filter(|n| !n.trim().is_empty()),
            Err(e) => {
                tracing::warn!(
                    request_type_id = %request_type_id,
                    error = %e,
                    "Request type name lookup failed, using generic workflow name"
                );
                None
            }
        };

        let name = format!(
            "{} {}",
            display_name.as_deref().map(str::trim).unwrap_or("Approval"),
            self.name_suffix
        );
        let new_workflow = NewWorkflow {
            request_type_id: request_type_id.clone(),
            description: Some(format!("Approval steps for {}", name)),
            name,
            created_by: created_by.cloned(),
        };

        let created = self
            .workflow_repo
            .create(&new_workflow)
            .await
            .map_err(resolution_error)?;

        tracing::info!(
            request_type_id = %request_type_id,
            workflow_id = %created.id,
            workflow_name = %created.name,
            "Created workflow"
        );

        if let Err(e) = self
            .request_type_repo
            .set_default_workflow(request_type_id, &created.id)
            .await
        {
            tracing::warn!(
                request_type_id = %request_type_id,
                workflow_id = %created.id,
                error = %e,
                "Failed to set default workflow for request type"
            );
        }

        Ok(created)
    }
}

fn resolution_error(error: CoreError) -> CoreError {
    match error {
        CoreError::Remote { code, message } => CoreError::ResolutionError(
            crate::validation::translate_remote_error(code.as_deref(), &message),
        ),
        CoreError::ResolutionError(msg) => CoreError::ResolutionError(msg),
        other => CoreError::ResolutionError(other.to_string()),
    }
}
