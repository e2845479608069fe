//! Repository traits for the approval step builder
//!
//! These traits are the store boundary of the builder. Storage crates
//! implement them; the services in `application` only see `Arc<dyn ...>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::step::StepRecord;
use super::workflow::{NewWorkflow, RequestTypeId, UserId, WorkflowDefinition, WorkflowId};
use crate::CoreError;

/// Repository for workflow records
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Most recently created active workflow for a request type
    async fn find_latest_active(
        &self,
        request_type_id: &RequestTypeId,
    ) -> Result<Option<WorkflowDefinition>, CoreError>;

    /// Find a workflow by ID
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, CoreError>;

    /// Insert a new workflow record; the store assigns the identifier
    async fn create(&self, workflow: &NewWorkflow) -> Result<WorkflowDefinition, CoreError>;
}

/// Repository for request types, consumed only for naming and default wiring
#[async_trait]
pub trait RequestTypeRepository: Send + Sync {
    /// Display name of a request type
    async fn display_name(&self, id: &RequestTypeId) -> Result<Option<String>, CoreError>;

    /// Point the request type's default workflow at `workflow_id`
    async fn set_default_workflow(
        &self,
        id: &RequestTypeId,
        workflow_id: &WorkflowId,
    ) -> Result<(), CoreError>;
}

/// Repository for the primary step table
#[async_trait]
pub trait StepRepository: Send + Sync {
    /// All step rows for a workflow, in any order
    async fn fetch_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError>;

    /// Delete every step row for a workflow, returning the number removed
    async fn delete_steps(&self, workflow_id: &WorkflowId) -> Result<u64, CoreError>;

    /// Bulk insert step rows
    async fn insert_steps(&self, steps: &[StepRecord]) -> Result<(), CoreError>;

    /// Atomically replace every step row for a workflow.
    ///
    /// On failure the previous rows must still be present.
    async fn replace_steps(
        &self,
        workflow_id: &WorkflowId,
        steps: &[StepRecord],
    ) -> Result<(), CoreError>;

    /// Whether any write (delete, insert or replace) has reached this table
    /// for the workflow. Once it has, the table is the only source of truth
    /// for that workflow and fallback sources are no longer read.
    async fn has_written(&self, workflow_id: &WorkflowId) -> Result<bool, CoreError>;
}

/// A read-only location steps can be loaded from, tried in priority order
#[async_trait]
pub trait StepSource: Send + Sync {
    /// Name used in logs
    fn source_name(&self) -> &str;

    /// All step rows this source holds for a workflow
    async fn read_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError>;
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Authenticated user
    pub user_id: UserId,
}

/// Identity and role lookup, consumed from the hosting platform
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session, if any
    async fn current_session(&self) -> Result<Option<Session>, CoreError>;

    /// Role names held by a user
    async fn user_roles(&self, user_id: &UserId) -> Result<Vec<String>, CoreError>;
}

/// The store handles a step builder is wired from
#[derive(Clone)]
pub struct Repositories {
    /// Workflow table
    pub workflows: Arc<dyn WorkflowRepository>,
    /// Request type table
    pub request_types: Arc<dyn RequestTypeRepository>,
    /// Primary step table
    pub steps: Arc<dyn StepRepository>,
    /// Legacy step table, read when the primary table has no rows
    pub legacy_steps: Option<Arc<dyn StepSource>>,
    /// Identity and role lookup
    pub identity: Arc<dyn IdentityProvider>,
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    fn injected(operation: &str) -> CoreError {
        CoreError::remote(None, format!("simulated {} failure", operation))
    }

    fn take(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }

    /// In-memory workflow table
    #[derive(Default)]
    pub struct MemoryWorkflowRepository {
        workflows: Arc<RwLock<Vec<WorkflowDefinition>>>,
        create_calls: AtomicUsize,
        lookup_calls: AtomicUsize,
        fail_lookup: AtomicBool,
        fail_create: AtomicBool,
    }

    impl MemoryWorkflowRepository {
        /// Create an empty workflow table
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed an existing workflow record
        pub async fn insert(&self, workflow: WorkflowDefinition) {
            self.workflows.write().await.push(workflow);
        }

        /// All stored workflows
        pub async fn all(&self) -> Vec<WorkflowDefinition> {
            self.workflows.read().await.clone()
        }

        /// Number of `create` calls seen
        pub fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }

        /// Number of `find_latest_active` calls seen
        pub fn lookup_calls(&self) -> usize {
            self.lookup_calls.load(Ordering::SeqCst)
        }

        /// Fail the next lookup
        pub fn fail_next_lookup(&self) {
            self.fail_lookup.store(true, Ordering::SeqCst);
        }

        /// Fail the next create
        pub fn fail_next_create(&self) {
            self.fail_create.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl WorkflowRepository for MemoryWorkflowRepository {
        async fn find_latest_active(
            &self,
            request_type_id: &RequestTypeId,
        ) -> Result<Option<WorkflowDefinition>, CoreError> {
            self.lookup_calls.fetch_add(1, Ordering::SeqCst);
            if take(&self.fail_lookup) {
                return Err(injected("workflow lookup"));
            }

            let workflows = self.workflows.read().await;
            // max_by_key keeps the later entry on equal timestamps
            Ok(workflows
                .iter()
                .filter(|w| w.is_active && &w.request_type_id == request_type_id)
                .max_by_key(|w| w.created_at)
                .cloned())
        }

        async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, CoreError> {
            let workflows = self.workflows.read().await;
            Ok(workflows.iter().find(|w| &w.id == id).cloned())
        }

        async fn create(&self, workflow: &NewWorkflow) -> Result<WorkflowDefinition, CoreError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if take(&self.fail_create) {
                return Err(injected("workflow create"));
            }

            let definition = workflow.clone().into_definition();
            self.workflows.write().await.push(definition.clone());
            Ok(definition)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct RequestTypeRow {
        display_name: Option<String>,
        default_workflow_id: Option<WorkflowId>,
    }

    /// In-memory request type table
    #[derive(Default)]
    pub struct MemoryRequestTypeRepository {
        request_types: Arc<RwLock<HashMap<RequestTypeId, RequestTypeRow>>>,
        fail_set_default: AtomicBool,
    }

    impl MemoryRequestTypeRepository {
        /// Create an empty request type table
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a request type
        pub async fn insert(&self, id: RequestTypeId, display_name: Option<&str>) {
            self.request_types.write().await.insert(
                id,
                RequestTypeRow {
                    display_name: display_name.map(str::to_string),
                    default_workflow_id: None,
                },
            );
        }

        /// Current default workflow of a request type
        pub async fn default_workflow(&self, id: &RequestTypeId) -> Option<WorkflowId> {
            self.request_types
                .read()
                .await
                .get(id)
                .and_then(|row| row.default_workflow_id)
        }

        /// Fail the next default workflow update
        pub fn fail_next_set_default(&self) {
            self.fail_set_default.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RequestTypeRepository for MemoryRequestTypeRepository {
        async fn display_name(&self, id: &RequestTypeId) -> Result<Option<String>, CoreError> {
            Ok(self
                .request_types
                .read()
                .await
                .get(id)
                .and_then(|row| row.display_name.clone()))
        }

        async fn set_default_workflow(
            &self,
            id: &RequestTypeId,
            workflow_id: &WorkflowId,
        ) -> Result<(), CoreError> {
            if take(&self.fail_set_default) {
                return Err(injected("default workflow update"));
            }

            let mut request_types = self.request_types.write().await;
            let row = request_types
                .get_mut(id)
                .ok_or_else(|| CoreError::NotFound(format!("Request type {}", id)))?;
            row.default_workflow_id = Some(*workflow_id);
            Ok(())
        }
    }

    /// In-memory step table; also usable as a named read source
    pub struct MemoryStepRepository {
        name: String,
        rows: Arc<RwLock<HashMap<WorkflowId, Vec<StepRecord>>>>,
        written: Arc<RwLock<HashSet<WorkflowId>>>,
        write_calls: AtomicUsize,
        fail_fetch: AtomicBool,
        fail_delete: AtomicBool,
        fail_insert: AtomicBool,
        fail_replace: AtomicBool,
    }

    impl Default for MemoryStepRepository {
        fn default() -> Self {
            Self::named("workflow_steps")
        }
    }

    impl MemoryStepRepository {
        /// Create the primary step table
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a step table with a specific source name
        pub fn named(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                rows: Arc::new(RwLock::new(HashMap::new())),
                written: Arc::new(RwLock::new(HashSet::new())),
                write_calls: AtomicUsize::new(0),
                fail_fetch: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
                fail_insert: AtomicBool::new(false),
                fail_replace: AtomicBool::new(false),
            }
        }

        /// Seed rows without counting or marking a write
        pub async fn seed(&self, steps: Vec<StepRecord>) {
            let mut rows = self.rows.write().await;
            for step in steps {
                rows.entry(step.workflow_id).or_default().push(step);
            }
        }

        /// Rows currently stored for a workflow
        pub async fn rows_for(&self, workflow_id: &WorkflowId) -> Vec<StepRecord> {
            self.rows
                .read()
                .await
                .get(workflow_id)
                .cloned()
                .unwrap_or_default()
        }

        /// Number of delete, insert and replace calls seen
        pub fn write_calls(&self) -> usize {
            self.write_calls.load(Ordering::SeqCst)
        }

        /// Fail the next fetch
        pub fn fail_next_fetch(&self) {
            self.fail_fetch.store(true, Ordering::SeqCst);
        }

        /// Fail the next delete
        pub fn fail_next_delete(&self) {
            self.fail_delete.store(true, Ordering::SeqCst);
        }

        /// Fail the next insert
        pub fn fail_next_insert(&self) {
            self.fail_insert.store(true, Ordering::SeqCst);
        }

        /// Fail the next atomic replace
        pub fn fail_next_replace(&self) {
            self.fail_replace.store(true, Ordering::SeqCst);
        }

        async fn fetch(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError> {
            if take(&self.fail_fetch) {
                return Err(injected("step fetch"));
            }
            Ok(self.rows_for(workflow_id).await)
        }
    }

    #[async_trait]
    impl StepRepository for MemoryStepRepository {
        async fn fetch_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError> {
            self.fetch(workflow_id).await
        }

        async fn delete_steps(&self, workflow_id: &WorkflowId) -> Result<u64, CoreError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if take(&self.fail_delete) {
                return Err(injected("step delete"));
            }
            let removed = self.rows.write().await.remove(workflow_id);
            self.written.write().await.insert(*workflow_id);
            Ok(removed.map(|rows| rows.len() as u64).unwrap_or(0))
        }

        async fn insert_steps(&self, steps: &[StepRecord]) -> Result<(), CoreError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if take(&self.fail_insert) {
                return Err(injected("step insert"));
            }
            let mut rows = self.rows.write().await;
            let mut written = self.written.write().await;
            for step in steps {
                rows.entry(step.workflow_id).or_default().push(step.clone());
                written.insert(step.workflow_id);
            }
            Ok(())
        }

        async fn replace_steps(
            &self,
            workflow_id: &WorkflowId,
            steps: &[StepRecord],
        ) -> Result<(), CoreError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if take(&self.fail_replace) {
                return Err(injected("step replace"));
            }
            // Swap under a single write lock so readers never see an empty set
            let mut rows = self.rows.write().await;
            rows.insert(*workflow_id, steps.to_vec());
            self.written.write().await.insert(*workflow_id);
            Ok(())
        }

        async fn has_written(&self, workflow_id: &WorkflowId) -> Result<bool, CoreError> {
            Ok(self.written.read().await.contains(workflow_id))
        }
    }

    #[async_trait]
    impl StepSource for MemoryStepRepository {
        fn source_name(&self) -> &str {
            &self.name
        }

        async fn read_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<StepRecord>, CoreError> {
            self.fetch(workflow_id).await
        }
    }

    /// In-memory identity provider
    #[derive(Default)]
    pub struct MemoryIdentityProvider {
        session: Arc<RwLock<Option<Session>>>,
        roles: Arc<RwLock<HashMap<UserId, Vec<String>>>>,
        fail_roles: AtomicBool,
    }

    impl MemoryIdentityProvider {
        /// Create a provider with no signed-in user
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a provider with a signed-in user holding `roles`
        pub async fn signed_in(user_id: &str, roles: &[&str]) -> Self {
            let provider = Self::new();
            provider.sign_in(UserId(user_id.to_string()), roles).await;
            provider
        }

        /// Sign a user in with the given roles
        pub async fn sign_in(&self, user_id: UserId, roles: &[&str]) {
            self.roles
                .write()
                .await
                .insert(user_id.clone(), roles.iter().map(|r| r.to_string()).collect());
            *self.session.write().await = Some(Session { user_id });
        }

        /// Clear the current session
        pub async fn sign_out(&self) {
            *self.session.write().await = None;
        }

        /// Fail the next role lookup
        pub fn fail_next_roles(&self) {
            self.fail_roles.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl IdentityProvider for MemoryIdentityProvider {
        async fn current_session(&self) -> Result<Option<Session>, CoreError> {
            Ok(self.session.read().await.clone())
        }

        async fn user_roles(&self, user_id: &UserId) -> Result<Vec<String>, CoreError> {
            if take(&self.fail_roles) {
                return Err(injected("role lookup"));
            }
            Ok(self
                .roles
                .read()
                .await
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }
    }

}
