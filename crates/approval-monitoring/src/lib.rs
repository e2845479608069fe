//! Monitoring support for the approval step builder.
//!
//! Only structured logging lives here: subscriber setup for services and
//! tests, plus a small extension trait for logging results in place.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod logging;

pub use logging::{init_logging, init_test_tracing, LogExt, LoggingHandle};

/// Configuration for initializing logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log level filter (e.g., "info,approval_core=debug"); `RUST_LOG` wins when set
    pub log_filter: String,
    /// Emit JSON lines instead of the pretty format
    pub enable_json_logging: bool,
    /// Also write JSON logs to this file, rotated daily
    pub log_file: Option<PathBuf>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "approval-builder".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
            log_file: None,
        }
    }
}
