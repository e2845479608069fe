//! Application services for the approval step builder

use std::sync::Arc;

use crate::config::BuilderConfig;
use crate::domain::repository::Repositories;

/// Advisory role check
pub mod permission_gate;

/// Lazy workflow lookup and creation
pub mod workflow_resolver;

/// Replace-all writes and prioritized reads
pub mod step_persistence;

/// Editing session orchestrating the services above
pub mod step_session;

pub use permission_gate::{PermissionCheck, PermissionGate};
pub use step_persistence::StepPersistence;
pub use step_session::{
    MutationOutcome, SessionSnapshot, SessionStatus, WorkflowStepSession,
};
pub use workflow_resolver::WorkflowResolver;

/// Services shared by every session of a step builder
#[derive(Clone)]
pub struct StepBuilderServices {
    /// Permission gate
    pub gate: Arc<PermissionGate>,
    /// Workflow resolver
    pub resolver: Arc<WorkflowResolver>,
    /// Step persistence
    pub persistence: Arc<StepPersistence>,
}

impl StepBuilderServices {
    /// Create services from explicit parts
    pub fn new(
        gate: Arc<PermissionGate>,
        resolver: Arc<WorkflowResolver>,
        persistence: Arc<StepPersistence>,
    ) -> Self {
        Self {
            gate,
            resolver,
            persistence,
        }
    }

    /// Wire the services from configuration and store handles
    pub fn from_config(config: &BuilderConfig, repos: Repositories) -> Self {
        let gate = PermissionGate::new(repos.identity, config.elevated_roles.clone());
        let resolver = WorkflowResolver::new(repos.workflows, repos.request_types)
            .with_name_suffix(config.workflow_name_suffix.clone());

        let mut persistence = StepPersistence::new(repos.steps).with_strategy(config.write_strategy);
        if config.legacy_fallback {
            if let Some(legacy) = repos.legacy_steps {
                persistence = persistence.with_fallback(legacy);
            }
        }

        tracing::debug!(
            write_strategy = ?config.write_strategy,
            legacy_fallback = config.legacy_fallback,
            "Step builder services wired"
        );

        Self::new(Arc::new(gate), Arc::new(resolver), Arc::new(persistence))
    }
}
