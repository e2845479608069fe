use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::validation::is_valid_uuid;

/// Sentinel used on the wire for a workflow that only exists client-side
pub const UNSAVED_WORKFLOW: &str = "unsaved";

/// Identifier of a persisted workflow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    /// Generate a fresh identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a request type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestTypeId(pub String);

impl fmt::Display for RequestTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// The workflow a step list belongs to.
///
/// `Unsaved` means no workflow record exists yet and the list is held
/// client-side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkflowRef {
    /// No workflow record exists yet
    #[default]
    Unsaved,
    /// A workflow record exists in the store
    Persisted(WorkflowId),
}

impl WorkflowRef {
    /// Interpret a cached identifier handed over by the UI layer.
    ///
    /// The sentinel, empty strings and malformed identifiers all map to
    /// `Unsaved`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == UNSAVED_WORKFLOW {
            return WorkflowRef::Unsaved;
        }
        if !is_valid_uuid(value) {
            tracing::warn!(cached_workflow_id = %value, "Ignoring malformed cached workflow id");
            return WorkflowRef::Unsaved;
        }
        match Uuid::parse_str(value) {
            Ok(id) => WorkflowRef::Persisted(WorkflowId(id)),
            Err(_) => WorkflowRef::Unsaved,
        }
    }

    /// The persisted identifier, if any
    pub fn persisted(&self) -> Option<WorkflowId> {
        match self {
            WorkflowRef::Persisted(id) => Some(*id),
            WorkflowRef::Unsaved => None,
        }
    }

    /// Whether the workflow only exists client-side
    pub fn is_unsaved(&self) -> bool {
        matches!(self, WorkflowRef::Unsaved)
    }
}

impl From<WorkflowId> for WorkflowRef {
    fn from(id: WorkflowId) -> Self {
        WorkflowRef::Persisted(id)
    }
}

impl fmt::Display for WorkflowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowRef::Unsaved => f.write_str(UNSAVED_WORKFLOW),
            WorkflowRef::Persisted(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for WorkflowRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorkflowRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(WorkflowRef::parse(&raw))
    }
}

/// A workflow record as stored in the workflow table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Store-assigned identifier
    pub id: WorkflowId,

    /// Owning request type
    pub request_type_id: RequestTypeId,

    /// Display name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Whether this is the active workflow for the request type
    pub is_active: bool,

    /// User that created the record
    pub created_by: Option<UserId>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a workflow record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    /// Owning request type
    pub request_type_id: RequestTypeId,

    /// Display name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Creating user, when known
    pub created_by: Option<UserId>,
}

impl NewWorkflow {
    /// Materialise the record with a fresh id, active, created now
    pub fn into_definition(self) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new_v4(),
            request_type_id: self.request_type_id,
            name: self.name,
            description: self.description,
            is_active: true,
            created_by: self.created_by,
            created_at: Utc::now(),
        }
    }
}
