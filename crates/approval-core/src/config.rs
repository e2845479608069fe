//! Configuration for the approval step builder
//!
//! Values are layered: built-in defaults, then an optional file, then
//! environment variables such as `APPROVAL__WRITE_STRATEGY=delete_then_insert`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::CoreError;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "APPROVAL";

/// How a replace-all write reaches the step table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// One atomic replace; a failure leaves the stored rows untouched
    #[default]
    Transactional,
    /// Delete, then bulk insert; an insert failure leaves the workflow empty
    DeleteThenInsert,
}

/// Step builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Roles treated as elevated by the permission gate
    #[serde(default = "default_elevated_roles")]
    pub elevated_roles: Vec<String>,

    /// Write strategy for step lists
    #[serde(default)]
    pub write_strategy: WriteStrategy,

    /// Whether loads consult the legacy step table
    #[serde(default = "default_legacy_fallback")]
    pub legacy_fallback: bool,

    /// Suffix appended to the request type name for created workflows
    #[serde(default = "default_workflow_name_suffix")]
    pub workflow_name_suffix: String,
}

fn default_elevated_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_legacy_fallback() -> bool {
    true
}

fn default_workflow_name_suffix() -> String {
    "Workflow".to_string()
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            elevated_roles: default_elevated_roles(),
            write_strategy: WriteStrategy::default(),
            legacy_fallback: default_legacy_fallback(),
            workflow_name_suffix: default_workflow_name_suffix(),
        }
    }
}

impl BuilderConfig {
    /// Load configuration from an optional file and `APPROVAL__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration using a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, CoreError> {
        let defaults = serde_json::to_string(&Self::default())?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults,
            config::FileFormat::Json,
        ));

        if let Some(path) = path {
            if !path.exists() {
                return Err(CoreError::ConfigurationError(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            write_strategy = ?config.write_strategy,
            legacy_fallback = config.legacy_fallback,
            "Loaded step builder configuration"
        );

        Ok(config)
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.workflow_name_suffix.trim().is_empty() {
            return Err(CoreError::ConfigurationError(
                "workflow_name_suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a role name is elevated
    pub fn is_elevated_role(&self, role: &str) -> bool {
        self.elevated_roles
            .iter()
            .any(|r| r.eq_ignore_ascii_case(role))
    }
}
