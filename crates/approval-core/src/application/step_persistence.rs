use std::sync::Arc;

use crate::config::WriteStrategy;
use crate::domain::ordering::renumber;
use crate::domain::repository::{StepRepository, StepSource};
use crate::domain::step::{StepId, StepRecord, WorkflowStep};
use crate::domain::workflow::{WorkflowId, WorkflowRef};
use crate::CoreError;

/// Replace-all writes and prioritized reads of a workflow's step list
pub struct StepPersistence {
    steps: Arc<dyn StepRepository>,
    fallbacks: Vec<Arc<dyn StepSource>>,
    strategy: WriteStrategy,
}

impl StepPersistence {
    /// Create a new step persistence service
    pub fn new(steps: Arc<dyn StepRepository>) -> Self {
        Self {
            steps,
            fallbacks: Vec::new(),
            strategy: WriteStrategy::default(),
        }
    }

    /// Use a specific write strategy
    pub fn with_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Register a read-only source consulted when earlier sources are empty
    pub fn with_fallback(mut self, source: Arc<dyn StepSource>) -> Self {
        self.fallbacks.push(source);
        self
    }

    /// Active write strategy
    pub fn strategy(&self) -> WriteStrategy {
        self.strategy
    }

    /// Replace every stored step of the workflow with `steps`.
    ///
    /// Returns the list as written, with missing identifiers assigned. An
    /// unsaved workflow performs no I/O.
    pub async fn replace_all(
        &self,
        workflow: WorkflowRef,
        steps: &[WorkflowStep],
    ) -> Result<Vec<WorkflowStep>, CoreError> {
        let workflow_id = match workflow {
            WorkflowRef::Unsaved => return Ok(steps.to_vec()),
            WorkflowRef::Persisted(id) => id,
        };

        let written: Vec<WorkflowStep> = steps
            .iter()
            .cloned()
            .map(|mut step| {
                step.id = Some(step.id.unwrap_or_else(StepId::new_v4));
                step
            })
            .collect();
        let written = renumber(written, workflow);

        let records = written
            .iter()
            .map(|step| StepRecord::from_step(step, workflow_id))
            .collect::<Result<Vec<_>, _>>()?;

        match self.strategy {
            WriteStrategy::Transactional => {
                self.steps
                    .replace_steps(&workflow_id, &records)
                    .await
                    .map_err(|e| {
                        tracing::error!(workflow_id = %workflow_id, error = %e, "Step replace failed");
                        e
                    })?;
            }
            WriteStrategy::DeleteThenInsert => {
                self.delete_then_insert(&workflow_id, &records).await?;
            }
        }

        tracing::info!(
            workflow_id = %workflow_id,
            steps = records.len(),
            strategy = ?self.strategy,
            "Replaced workflow steps"
        );

        Ok(written)
    }

    async fn delete_then_insert(
        &self,
        workflow_id: &WorkflowId,
        records: &[StepRecord],
    ) -> Result<(), CoreError> {
        let removed = self.steps.delete_steps(workflow_id).await.map_err(|e| {
            tracing::error!(workflow_id = %workflow_id, error = %e, "Step delete failed");
            e
        })?;

        if records.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.steps.insert_steps(records).await {
            tracing::error!(
                workflow_id = %workflow_id,
                removed,
                error = %e,
                "Step insert failed after delete, workflow has no stored steps"
            );
            return Err(CoreError::PartialWrite {
                workflow_id: workflow_id.to_string(),
                message: crate::validation::user_message(&e),
            });
        }

        Ok(())
    }

    /// Load the workflow's steps sorted by stored order and renumbered.
    ///
    /// The primary table is read first. Fallbacks are read in registration
    /// order only for workflows the primary table has never been written for;
    /// an emptied primary list stays empty.
    pub async fn load_all(&self, workflow: WorkflowRef) -> Result<Vec<WorkflowStep>, CoreError> {
        let workflow_id = match workflow {
            WorkflowRef::Unsaved => return Ok(Vec::new()),
            WorkflowRef::Persisted(id) => id,
        };

        let mut records = self.steps.fetch_steps(&workflow_id).await?;

        if records.is_empty()
            && !self.fallbacks.is_empty()
            && !self.steps.has_written(&workflow_id).await?
        {
            for source in &self.fallbacks {
                match source.read_steps(&workflow_id).await {
                    Ok(found) if !found.is_empty() => {
                        tracing::info!(
                            workflow_id = %workflow_id,
                            source = source.source_name(),
                            steps = found.len(),
                            "Loaded steps from fallback source"
                        );
                        records = found;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            workflow_id = %workflow_id,
                            source = source.source_name(),
                            error = %e,
                            "Fallback step source failed, skipping"
                        );
                    }
                }
            }
        }

        records.sort_by_key(|record| record.step_order);
        let steps = records.into_iter().map(StepRecord::into_step).collect();

        tracing::debug!(workflow_id = %workflow_id, "Loaded workflow steps");
        Ok(renumber(steps, workflow))
    }
}
