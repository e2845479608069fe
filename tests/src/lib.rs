//! Shared fixtures for the step builder scenario tests.
//!
//! A `Harness` owns one in-memory store (workflows, request types, primary
//! and legacy step tables, identity) so several sessions can be opened
//! against the same data.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use approval_core::domain::repository::memory::{
    MemoryIdentityProvider, MemoryRequestTypeRepository, MemoryStepRepository,
    MemoryWorkflowRepository,
};
use approval_core::{
    BuilderConfig, CoreError, MutationOutcome, Repositories, RequestTypeId, SessionSnapshot,
    StepBuilderServices, StepDraft, StepId, StepRecord, StepType, WorkflowId, WorkflowRef,
    WorkflowStep, WorkflowStepSession,
};
use approval_monitoring::LogExt;

/// Request type seeded by every harness
pub const PURCHASE: &str = "purchase";

/// Display name of the seeded request type
pub const PURCHASE_NAME: &str = "Purchase Request";

/// In-memory store plus the configuration used to wire services
pub struct Harness {
    pub workflows: Arc<MemoryWorkflowRepository>,
    pub request_types: Arc<MemoryRequestTypeRepository>,
    pub steps: Arc<MemoryStepRepository>,
    pub legacy_steps: Arc<MemoryStepRepository>,
    pub identity: Arc<MemoryIdentityProvider>,
    pub config: BuilderConfig,
}

impl Harness {
    /// Store with an admin signed in and the purchase request type seeded
    pub async fn new() -> Self {
        Self::with_config(BuilderConfig::default()).await
    }

    /// Same as `new` with an explicit configuration
    pub async fn with_config(config: BuilderConfig) -> Self {
        approval_monitoring::init_test_tracing();

        let request_types = Arc::new(MemoryRequestTypeRepository::new());
        request_types
            .insert(RequestTypeId(PURCHASE.to_string()), Some(PURCHASE_NAME))
            .await;

        Self {
            workflows: Arc::new(MemoryWorkflowRepository::new()),
            request_types,
            steps: Arc::new(MemoryStepRepository::new()),
            legacy_steps: Arc::new(MemoryStepRepository::named("approval_steps")),
            identity: Arc::new(MemoryIdentityProvider::signed_in("admin-1", &["admin"]).await),
            config,
        }
    }

    /// Harness configured from a file, layered over the defaults
    pub async fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        let config = BuilderConfig::load_with_prefix(Some(path), "APPROVAL_SCENARIO")
            .log_err("Scenario configuration rejected")
            .with_context(|| format!("Failed to load {}", path.display()))?;
        Ok(Self::with_config(config).await)
    }

    /// Handles to every repository of this store
    pub fn repositories(&self) -> Repositories {
        Repositories {
            workflows: self.workflows.clone(),
            request_types: self.request_types.clone(),
            steps: self.steps.clone(),
            legacy_steps: Some(self.legacy_steps.clone()),
            identity: self.identity.clone(),
        }
    }

    /// Services wired from the harness configuration
    pub fn services(&self) -> StepBuilderServices {
        StepBuilderServices::from_config(&self.config, self.repositories())
    }

    /// Fresh session for the purchase request type with nothing cached
    pub fn purchase_session(&self) -> WorkflowStepSession {
        self.session(Some(PURCHASE), WorkflowRef::Unsaved)
    }

    /// Fresh session for any request type and cached workflow
    pub fn session(&self, request_type: Option<&str>, cached: WorkflowRef) -> WorkflowStepSession {
        WorkflowStepSession::new(
            request_type.map(|id| RequestTypeId(id.to_string())),
            cached,
            self.services(),
        )
    }

    /// Seed a legacy row for `workflow_id`
    pub async fn seed_legacy(&self, workflow_id: WorkflowId, name: &str, order: i32) {
        self.legacy_steps
            .seed(vec![record(workflow_id, name, order)])
            .await;
    }
}

/// A stored row with a fresh id
pub fn record(workflow_id: WorkflowId, name: &str, order: i32) -> StepRecord {
    StepRecord {
        id: StepId::new_v4(),
        workflow_id,
        step_name: name.to_string(),
        step_type: StepType::Decision,
        approver_id: "U1".to_string(),
        is_required: true,
        step_order: order,
        instructions: None,
    }
}

/// Fill the draft and commit it
pub async fn add_step(
    session: &WorkflowStepSession,
    name: &str,
    step_type: StepType,
    approver: &str,
) -> Result<MutationOutcome, CoreError> {
    let draft = StepDraft::new(name, step_type, approver);
    session.update_draft(|d| *d = draft).await?;
    session
        .add_or_update_draft()
        .await
        .log_err("Adding step failed")
}

/// Add decision steps approved by `U1`, one per name
pub async fn add_steps(session: &WorkflowStepSession, names: &[&str]) -> anyhow::Result<()> {
    for name in names {
        add_step(session, name, StepType::Decision, "U1")
            .await
            .with_context(|| format!("Failed to add step {}", name))?;
    }
    Ok(())
}

/// Step names in list order
pub fn names(steps: &[WorkflowStep]) -> Vec<String> {
    steps.iter().map(|s| s.name.clone()).collect()
}

/// Step names of a snapshot in list order
pub fn snapshot_names(snapshot: &SessionSnapshot) -> Vec<String> {
    names(&snapshot.steps)
}

/// Panic unless orders are exactly `1..=N` and every step carries `workflow`
pub fn assert_contiguous(steps: &[WorkflowStep], workflow: WorkflowRef) {
    let orders: Vec<u32> = steps.iter().map(|s| s.order).collect();
    let expected: Vec<u32> = (1..=steps.len() as u32).collect();
    assert_eq!(orders, expected, "orders are not contiguous");
    assert!(
        steps.iter().all(|s| s.workflow == workflow),
        "a step carries a stale workflow reference"
    );
}
