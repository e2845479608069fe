//! Domain model for the approval step builder

pub mod ordering;
pub mod repository;
pub mod step;
pub mod workflow;

pub use ordering::Direction;
pub use step::{StepDraft, StepId, StepRecord, StepType, WorkflowStep};
pub use workflow::{
    NewWorkflow, RequestTypeId, UserId, WorkflowDefinition, WorkflowId, WorkflowRef,
    UNSAVED_WORKFLOW,
};
