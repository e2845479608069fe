/// Generate SQL migrations for the step builder tables
///
/// Each entry is `(version, sql)`; versions are applied in order and
/// recorded so reruns are no-ops.
pub fn generate_migrations() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "20240501000000_initial_schema",
            r#"
            -- Request types, consumed for naming and default workflow wiring
            CREATE TABLE IF NOT EXISTS request_types (
                id TEXT PRIMARY KEY,
                name TEXT,
                default_workflow_id UUID,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            -- Workflow definitions; at most one active default per request type
            CREATE TABLE IF NOT EXISTS workflows (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                description TEXT,
                request_type_id TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_by TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_workflows_request_type_active
                ON workflows(request_type_id, is_active, created_at DESC);

            -- Primary step table
            CREATE TABLE IF NOT EXISTS workflow_steps (
                id UUID PRIMARY KEY,
                workflow_id UUID NOT NULL,
                step_name TEXT NOT NULL,
                step_type TEXT NOT NULL CHECK (step_type IN ('decision', 'opinion', 'notification')),
                approver_id TEXT NOT NULL,
                is_required BOOLEAN NOT NULL DEFAULT TRUE,
                step_order INTEGER NOT NULL,
                instructions TEXT,
                CONSTRAINT fk_workflow_steps_workflow FOREIGN KEY (workflow_id) REFERENCES workflows(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_workflow_steps_workflow_order
                ON workflow_steps(workflow_id, step_order);

            -- Role assignments read by the permission gate
            CREATE TABLE IF NOT EXISTS user_roles (
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (user_id, role)
            );
            "#,
        ),
        (
            "20240502000000_legacy_steps",
            r#"
            -- Legacy step table, read until workflow_steps is written for a workflow
            CREATE TABLE IF NOT EXISTS approval_steps (
                id UUID PRIMARY KEY,
                workflow_id UUID NOT NULL,
                step_name TEXT NOT NULL,
                step_type TEXT NOT NULL,
                approver_id TEXT NOT NULL,
                is_required BOOLEAN NOT NULL DEFAULT TRUE,
                step_order INTEGER NOT NULL,
                instructions TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_approval_steps_workflow
                ON approval_steps(workflow_id);
            "#,
        ),
        (
            "20240503000000_step_table_writes",
            r#"
            -- Workflows whose step table has been written; fallback reads stop once a row exists
            CREATE TABLE IF NOT EXISTS step_table_writes (
                step_table TEXT NOT NULL,
                workflow_id UUID NOT NULL,
                written_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (step_table, workflow_id)
            );
            "#,
        ),
    ]
}
