//! Editing session for one request type's approval steps
//!
//! The session owns the ordered list, the draft and the editing index, and
//! drives every mutation through the permission gate, the ordering engine,
//! the workflow resolver and step persistence. Only one mutation may be in
//! flight at a time; a second one is rejected with `CoreError::SessionBusy`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::StepBuilderServices;
use crate::domain::ordering::{self, Direction};
use crate::domain::step::{StepDraft, WorkflowStep};
use crate::domain::workflow::{RequestTypeId, WorkflowRef};
use crate::validation::user_message;
use crate::CoreError;

/// Observable state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "index")]
pub enum SessionStatus {
    /// Ready for input
    Idle,
    /// The draft holds a copy of the step at this index
    Editing(usize),
    /// A load or write is in flight
    Mutating,
}

/// Result of a mutating operation that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The new list was written to the store
    Persisted,
    /// The new list is held client-side only
    LocalOnly,
    /// Nothing changed
    Unchanged,
}

/// Cloned view of the session for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current workflow
    pub workflow: WorkflowRef,

    /// Ordered step list
    pub steps: Vec<WorkflowStep>,

    /// Step being composed or edited
    pub draft: StepDraft,

    /// Order the draft will take once committed
    pub draft_order: u32,

    /// Index being edited, if any
    pub editing_index: Option<usize>,

    /// Current status
    pub status: SessionStatus,

    /// Message for the transient error notification
    pub last_error: Option<String>,

    /// The store may hold fewer steps than shown; `save_all` repairs it
    pub needs_reconcile: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    workflow: WorkflowRef,
    steps: Vec<WorkflowStep>,
    draft: StepDraft,
    editing_index: Option<usize>,
    last_error: Option<String>,
    needs_reconcile: bool,
}

/// A computed mutation, applied only after the write succeeds
struct Plan {
    steps: Vec<WorkflowStep>,
    editing_index: Option<usize>,
    reset_draft: bool,
    unchanged: bool,
}

impl Plan {
    fn unchanged(state: &SessionState) -> Self {
        Self {
            steps: state.steps.clone(),
            editing_index: state.editing_index,
            reset_draft: false,
            unchanged: true,
        }
    }
}

/// Clears the in-flight flag when the mutation ends, including on cancellation
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Editing session for the approval steps of one request type
pub struct WorkflowStepSession {
    request_type_id: Option<RequestTypeId>,
    services: StepBuilderServices,
    state: RwLock<SessionState>,
    in_flight: AtomicBool,
}

impl WorkflowStepSession {
    /// Create a session; `cached` is the workflow the UI last saw, if any
    pub fn new(
        request_type_id: Option<RequestTypeId>,
        cached: WorkflowRef,
        services: StepBuilderServices,
    ) -> Self {
        Self {
            request_type_id,
            services,
            state: RwLock::new(SessionState {
                workflow: cached,
                ..Default::default()
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Request type this session edits
    pub fn request_type_id(&self) -> Option<&RequestTypeId> {
        self.request_type_id.as_ref()
    }

    fn begin(&self) -> Result<InFlight<'_>, CoreError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| CoreError::SessionBusy)
    }

    fn ensure_idle(&self) -> Result<(), CoreError> {
        if self.in_flight.load(Ordering::SeqCst) {
            Err(CoreError::SessionBusy)
        } else {
            Ok(())
        }
    }

    /// Cloned view of the current state
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        let status = if self.in_flight.load(Ordering::SeqCst) {
            SessionStatus::Mutating
        } else if let Some(index) = state.editing_index {
            SessionStatus::Editing(index)
        } else {
            SessionStatus::Idle
        };
        let draft_order = match state.editing_index {
            Some(index) => index as u32 + 1,
            None => state.steps.len() as u32 + 1,
        };

        SessionSnapshot {
            workflow: state.workflow,
            steps: state.steps.clone(),
            draft: state.draft.clone(),
            draft_order,
            editing_index: state.editing_index,
            status,
            last_error: state.last_error.clone(),
            needs_reconcile: state.needs_reconcile,
        }
    }

    /// Load the stored steps; never creates a workflow
    pub async fn load(&self) -> Result<Vec<WorkflowStep>, CoreError> {
        let _guard = self.begin()?;
        let cached = self.state.read().await.workflow;

        let result = async {
            let workflow = match (cached, &self.request_type_id) {
                (WorkflowRef::Persisted(_), _) => cached,
                (WorkflowRef::Unsaved, Some(request_type_id)) => self
                    .services
                    .resolver
                    .find_active(request_type_id)
                    .await?
                    .map(|def| WorkflowRef::Persisted(def.id))
                    .unwrap_or(WorkflowRef::Unsaved),
                (WorkflowRef::Unsaved, None) => WorkflowRef::Unsaved,
            };
            let steps = self.services.persistence.load_all(workflow).await?;
            Ok::<_, CoreError>((workflow, steps))
        }
        .await;

        let mut state = self.state.write().await;
        match result {
            Ok((workflow, steps)) => {
                tracing::debug!(workflow = %workflow, steps = steps.len(), "Session loaded");
                state.workflow = workflow;
                state.steps = steps.clone();
                state.draft = StepDraft::default();
                state.editing_index = None;
                state.needs_reconcile = false;
                state.last_error = None;
                Ok(steps)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load workflow steps");
                state.last_error = Some(user_message(&e));
                Err(e)
            }
        }
    }

    /// Edit the draft in place
    pub async fn update_draft<F>(&self, edit: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut StepDraft),
    {
        self.ensure_idle()?;
        let mut state = self.state.write().await;
        edit(&mut state.draft);
        Ok(())
    }

    /// Commit the draft: append it, or replace the step being edited
    pub async fn add_or_update_draft(&self) -> Result<MutationOutcome, CoreError> {
        self.mutate("add_or_update_step", |state| {
            state.draft.validate()?;
            let steps = ordering::insert_or_replace(
                &state.steps,
                &state.draft,
                state.editing_index,
                state.workflow,
            )?;
            Ok(Plan {
                steps,
                editing_index: None,
                reset_draft: true,
                unchanged: false,
            })
        })
        .await
    }

    /// Whether removing `index` needs explicit confirmation (the last step)
    pub async fn requires_confirmation(&self, index: usize) -> bool {
        let state = self.state.read().await;
        state.steps.len() == 1 && index == 0
    }

    /// Remove the step at `index`
    pub async fn remove_step(&self, index: usize) -> Result<MutationOutcome, CoreError> {
        self.mutate("remove_step", |state| {
            let steps = ordering::remove_at(&state.steps, index, state.workflow)?;
            let editing_index = ordering::editing_index_after_remove(state.editing_index, index);
            Ok(Plan {
                steps,
                reset_draft: state.editing_index.is_some() && editing_index.is_none(),
                editing_index,
                unchanged: false,
            })
        })
        .await
    }

    /// Swap the step at `index` with its neighbour; a no-op at the boundaries
    pub async fn move_step(
        &self,
        index: usize,
        direction: Direction,
    ) -> Result<MutationOutcome, CoreError> {
        self.mutate("move_step", |state| {
            if index >= state.steps.len() {
                return Err(CoreError::IndexOutOfRange {
                    index,
                    len: state.steps.len(),
                });
            }
            let target = match ordering::swap_target(state.steps.len(), index, direction) {
                Some(target) => target,
                None => return Ok(Plan::unchanged(state)),
            };
            Ok(Plan {
                steps: ordering::swap_adjacent(&state.steps, index, direction, state.workflow),
                editing_index: ordering::editing_index_after_swap(
                    state.editing_index,
                    index,
                    target,
                ),
                reset_draft: false,
                unchanged: false,
            })
        })
        .await
    }

    /// Write the in-memory list again, repairing a partial write
    pub async fn save_all(&self) -> Result<MutationOutcome, CoreError> {
        self.mutate("save_all_steps", |state| {
            for step in &state.steps {
                step.validate()?;
            }
            Ok(Plan {
                steps: ordering::renumber(state.steps.clone(), state.workflow),
                editing_index: state.editing_index,
                reset_draft: false,
                unchanged: false,
            })
        })
        .await
    }

    /// Copy the step at `index` into the draft
    pub async fn begin_edit(&self, index: usize) -> Result<(), CoreError> {
        self.ensure_idle()?;
        let mut state = self.state.write().await;
        let draft = state
            .steps
            .get(index)
            .map(StepDraft::from_step)
            .ok_or(CoreError::IndexOutOfRange {
                index,
                len: state.steps.len(),
            })?;
        state.draft = draft;
        state.editing_index = Some(index);
        Ok(())
    }

    /// Drop the draft and leave editing mode
    pub async fn cancel_edit(&self) -> Result<(), CoreError> {
        self.ensure_idle()?;
        let mut state = self.state.write().await;
        state.draft = StepDraft::default();
        state.editing_index = None;
        Ok(())
    }

    /// Dismiss the current error notification
    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    async fn mutate<F>(&self, action: &'static str, compute: F) -> Result<MutationOutcome, CoreError>
    where
        F: FnOnce(&SessionState) -> Result<Plan, CoreError>,
    {
        let _guard = self.begin()?;

        let permission = self.services.gate.check(action).await;

        let (plan, current) = {
            let state = self.state.read().await;
            (compute(&*state), state.workflow)
        };
        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => {
                self.state.write().await.last_error = Some(user_message(&e));
                return Err(e);
            }
        };
        if plan.unchanged {
            return Ok(MutationOutcome::Unchanged);
        }

        let mut workflow = current;
        if workflow.is_unsaved() && !plan.steps.is_empty() {
            match self
                .services
                .resolver
                .ensure_workflow_exists(
                    self.request_type_id.as_ref(),
                    workflow,
                    permission.user.as_ref(),
                )
                .await
            {
                Ok(resolved) => workflow = resolved,
                Err(e) => {
                    tracing::warn!(
                        action,
                        error = %e,
                        "Workflow resolution failed, keeping change locally"
                    );
                    let mut state = self.state.write().await;
                    apply_plan(&mut state, WorkflowRef::Unsaved, plan.steps.clone(), &plan);
                    state.last_error = Some(user_message(&e));
                    return Ok(MutationOutcome::LocalOnly);
                }
            }
        }

        let steps = ordering::renumber(plan.steps.clone(), workflow);
        match self.services.persistence.replace_all(workflow, &steps).await {
            Ok(written) => {
                let mut state = self.state.write().await;
                apply_plan(&mut state, workflow, written, &plan);
                state.last_error = None;
                state.needs_reconcile = false;

                tracing::info!(action, workflow = %workflow, steps = state.steps.len(), "Step list updated");
                Ok(if workflow.is_unsaved() {
                    MutationOutcome::LocalOnly
                } else {
                    MutationOutcome::Persisted
                })
            }
            Err(e) => {
                tracing::error!(action, workflow = %workflow, error = %e, "Step list write failed");
                let mut state = self.state.write().await;
                // Keep the resolved workflow so a retry does not create another one
                if state.workflow != workflow {
                    state.workflow = workflow;
                    let steps = std::mem::take(&mut state.steps);
                    state.steps = ordering::renumber(steps, workflow);
                }
                if matches!(e, CoreError::PartialWrite { .. }) {
                    state.needs_reconcile = true;
                }
                state.last_error = Some(user_message(&e));
                Err(e)
            }
        }
    }
}

fn apply_plan(state: &mut SessionState, workflow: WorkflowRef, steps: Vec<WorkflowStep>, plan: &Plan) {
    state.workflow = workflow;
    state.steps = ordering::renumber(steps, workflow);
    state.editing_index = plan.editing_index;
    if plan.reset_draft {
        state.draft = StepDraft::default();
    }
}
