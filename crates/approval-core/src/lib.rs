//!
//! Approval Core - step builder for approval workflows
//!
//! This crate defines the domain model, the ordering engine, the store
//! traits and the services used to define and persist the ordered approval
//! steps of a request type's workflow.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - step model, ordering engine and store traits
pub mod domain;

/// Application services - permission gate, resolver, persistence, session
pub mod application;

/// Configuration
pub mod config;

/// Error types
pub mod error;

/// Identifier validation and user-facing error messages
pub mod validation;

pub use config::{BuilderConfig, WriteStrategy};
pub use error::CoreError;

pub use application::{
    MutationOutcome, PermissionCheck, PermissionGate, SessionSnapshot, SessionStatus,
    StepBuilderServices, StepPersistence, WorkflowResolver, WorkflowStepSession,
};
pub use domain::ordering::Direction;
pub use domain::repository::{
    IdentityProvider, Repositories, RequestTypeRepository, Session, StepRepository, StepSource,
    WorkflowRepository,
};
pub use domain::step::{StepDraft, StepId, StepRecord, StepType, WorkflowStep};
pub use domain::workflow::{
    NewWorkflow, RequestTypeId, UserId, WorkflowDefinition, WorkflowId, WorkflowRef,
};
