//! Runtime configuration schemas
//!
//! Schema types only; file loading, validation, and environment overrides
//! live outside the control plane.

use serde::{Deserialize, Serialize};

use warden_governance::GovernanceConfig;
use warden_types::DEFAULT_LOCALE;

/// Global runtime behavior and constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Unique identifier for the runtime instance
    pub runtime_id: String,
    /// Execution mode (e.g. development, staging, production)
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Maximum concurrent executions allowed
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Default locale when the execution context does not carry one
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Stop on the first unrecoverable error
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_mode() -> String {
    "development".to_string()
}

fn default_concurrency() -> u32 {
    1
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_id: "warden".to_string(),
            mode: default_mode(),
            concurrency: default_concurrency(),
            default_locale: default_locale(),
            fail_fast: false,
        }
    }
}

/// Complete configuration consumed by [`crate::Runtime`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Runtime behavior
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Policy configuration for the governance gates
    #[serde(default)]
    pub governance: GovernanceConfig,
}
