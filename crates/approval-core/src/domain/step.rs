use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::workflow::{WorkflowId, WorkflowRef};
use crate::CoreError;

/// Identifier of a persisted step row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub Uuid);

impl StepId {
    /// Generate a fresh identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of approval step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Requires an explicit approve/reject outcome
    #[default]
    Decision,
    /// Requests non-binding feedback
    Opinion,
    /// Informational only
    Notification,
}

impl StepType {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Decision => "decision",
            StepType::Opinion => "opinion",
            StepType::Notification => "notification",
        }
    }

    /// Label shown in the step list
    pub fn label(&self) -> &'static str {
        match self {
            StepType::Decision => "Decision",
            StepType::Opinion => "Opinion",
            StepType::Notification => "Notification",
        }
    }

    /// Whether the approver must record an approve/reject outcome
    pub fn requires_decision(&self) -> bool {
        matches!(self, StepType::Decision)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decision" => Ok(StepType::Decision),
            "opinion" => Ok(StepType::Opinion),
            "notification" => Ok(StepType::Notification),
            other => Err(CoreError::ValidationError(format!(
                "Unknown step type: {}",
                other
            ))),
        }
    }
}

/// One stage of a workflow as held in a session's ordered list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Row identifier, `None` until first persisted
    pub id: Option<StepId>,

    /// Workflow the list belongs to
    pub workflow: WorkflowRef,

    /// 1-based position, derived from the list position
    pub order: u32,

    /// Step name
    pub name: String,

    /// Step kind
    pub step_type: StepType,

    /// User or role responsible for the step
    pub approver_id: Option<String>,

    /// Whether the step may be skipped during execution
    pub required: bool,

    /// Free text shown to the approver
    pub instructions: Option<String>,
}

impl WorkflowStep {
    /// A step needs a name and an approver to be stored
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_fields(&self.name, self.approver_id.as_deref())
    }
}

/// The step currently being composed or edited.
///
/// A draft never carries an order or a workflow; both are derived when the
/// draft is committed into the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDraft {
    /// Identifier of the step being edited
    #[serde(default)]
    pub(crate) id: Option<StepId>,

    /// Step name
    pub name: String,

    /// Step kind
    pub step_type: StepType,

    /// User or role responsible for the step
    pub approver_id: Option<String>,

    /// Whether the step may be skipped during execution
    pub required: bool,

    /// Free text shown to the approver
    pub instructions: Option<String>,
}

impl Default for StepDraft {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            step_type: StepType::Decision,
            approver_id: None,
            required: true,
            instructions: None,
        }
    }
}

impl StepDraft {
    /// Start a draft with a name, type and approver
    pub fn new(name: impl Into<String>, step_type: StepType, approver_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step_type,
            approver_id: Some(approver_id.into()),
            ..Default::default()
        }
    }

    /// Set the instructions
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set whether the step is required
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Copy an existing step into a draft for editing
    pub fn from_step(step: &WorkflowStep) -> Self {
        Self {
            id: step.id,
            name: step.name.clone(),
            step_type: step.step_type,
            approver_id: step.approver_id.clone(),
            required: step.required,
            instructions: step.instructions.clone(),
        }
    }

    /// Identifier of the step this draft edits, if any
    pub fn editing_step_id(&self) -> Option<StepId> {
        self.id
    }

    /// Check the draft can be committed
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_fields(&self.name, self.approver_id.as_deref())
    }

    /// Build the list element; order and workflow are placeholders until
    /// the ordering engine renumbers and stamps the list.
    pub fn to_step(&self, workflow: WorkflowRef) -> WorkflowStep {
        WorkflowStep {
            id: self.id,
            workflow,
            order: 0,
            name: self.name.trim().to_string(),
            step_type: self.step_type,
            approver_id: self
                .approver_id
                .as_ref()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            required: self.required,
            instructions: self
                .instructions
                .as_ref()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty()),
        }
    }
}

fn validate_fields(name: &str, approver_id: Option<&str>) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "Step name is required".to_string(),
        ));
    }
    match approver_id {
        Some(approver) if !approver.trim().is_empty() => Ok(()),
        _ => Err(CoreError::ValidationError(
            "Approver is required".to_string(),
        )),
    }
}

/// A step row as written to and read from the step tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Row identifier
    pub id: StepId,

    /// Owning workflow
    pub workflow_id: WorkflowId,

    /// Step name
    pub step_name: String,

    /// Step kind
    pub step_type: StepType,

    /// User or role responsible for the step
    pub approver_id: String,

    /// Whether the step may be skipped
    pub is_required: bool,

    /// 1-based position
    pub step_order: i32,

    /// Free text shown to the approver
    pub instructions: Option<String>,
}

impl StepRecord {
    /// Build the row for a step, assigning an id when the step has none.
    ///
    /// Only referential fields are checked here.
    pub fn from_step(step: &WorkflowStep, workflow_id: WorkflowId) -> Result<Self, CoreError> {
        let approver_id = step
            .approver_id
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "Step {} has no approver and cannot be stored",
                    step.order
                ))
            })?;

        Ok(Self {
            id: step.id.unwrap_or_else(StepId::new_v4),
            workflow_id,
            step_name: step.name.clone(),
            step_type: step.step_type,
            approver_id,
            is_required: step.required,
            step_order: i32::try_from(step.order).map_err(|_| {
                CoreError::ValidationError(format!("Step order {} is too large", step.order))
            })?,
            instructions: step.instructions.clone(),
        })
    }

    /// Convert the row back into a list element
    pub fn into_step(self) -> WorkflowStep {
        WorkflowStep {
            id: Some(self.id),
            workflow: WorkflowRef::Persisted(self.workflow_id),
            order: u32::try_from(self.step_order).unwrap_or(0),
            name: self.step_name,
            step_type: self.step_type,
            approver_id: Some(self.approver_id),
            required: self.is_required,
            instructions: self.instructions,
        }
    }
}
