//! Execution context - the immutable correlation/permission/budget carrier
//!
//! An `ExecutionContext` carries every cross-cutting concern needed to run
//! agents, tools, and services in a controlled and observable manner. It is
//! created once per run and propagated immutably: any "update" produces a
//! new instance that shares the same identity fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ids::{is_valid_id, new_correlation_id, new_run_id};

/// Fallback locale when neither the caller nor the runtime supplies one
pub const DEFAULT_LOCALE: &str = "en-US";

/// Declared budget limits for one execution
///
/// Every dimension is optional; an absent limit means that dimension is
/// unbounded and never fails enforcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetLimits {
    /// Wall-clock limit for the whole run, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<f64>,
    /// Maximum number of governed calls (tool/service invocations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_limit: Option<u64>,
    /// Maximum accumulated cost, in the deployment's cost unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_limit: Option<f64>,
}

impl BudgetLimits {
    /// Limits with no bound on any dimension
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// True when no dimension is bounded
    pub fn is_unbounded(&self) -> bool {
        self.time_limit_seconds.is_none() && self.call_limit.is_none() && self.cost_limit.is_none()
    }
}

/// Context construction failure
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// An identity field did not parse as a UUID
    #[error("invalid {field}: '{value}' is not a valid UUID")]
    InvalidId { field: &'static str, value: String },
}

/// Optional inputs for [`ExecutionContext::create`]
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Effective permission grant set (boolean flags, a reserved
    /// `"permissions"` list, or one level of nested per-resource maps)
    pub permissions: Map<String, Value>,
    /// Budget limits for the run
    pub budget: BudgetLimits,
    /// Locale override; falls back to the runtime default, then
    /// [`DEFAULT_LOCALE`]
    pub locale: Option<String>,
    /// Trace/logging propagation metadata
    pub observability: Map<String, Value>,
    /// Free-form, non-authoritative contextual data
    pub metadata: Map<String, Value>,
}

/// Immutable execution context
///
/// Fields are private by design: there is no `&mut` surface, so a context
/// can never be mutated after construction. [`ExecutionContext::propagate`]
/// is the only way to derive a new context, and it carries `run_id`,
/// `correlation_id`, `permissions`, `budget`, `locale`, and `observability`
/// through unchanged for the lifetime of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContext")]
pub struct ExecutionContext {
    run_id: String,
    correlation_id: String,
    initiator: String,
    permissions: Map<String, Value>,
    budget: BudgetLimits,
    locale: String,
    observability: Map<String, Value>,
    metadata: Map<String, Value>,
}

/// Deserialization shadow for [`ExecutionContext`]; re-runs id validation
#[derive(Debug, Deserialize)]
struct RawContext {
    run_id: String,
    correlation_id: String,
    initiator: String,
    #[serde(default)]
    permissions: Map<String, Value>,
    #[serde(default)]
    budget: BudgetLimits,
    locale: String,
    #[serde(default)]
    observability: Map<String, Value>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl TryFrom<RawContext> for ExecutionContext {
    type Error = ContextError;

    fn try_from(raw: RawContext) -> Result<Self, Self::Error> {
        Self::from_parts(
            raw.run_id,
            raw.correlation_id,
            raw.initiator,
            raw.permissions,
            raw.budget,
            raw.locale,
            raw.observability,
            raw.metadata,
        )
    }
}

impl ExecutionContext {
    /// Create a fresh context with newly generated identity fields
    pub fn create(initiator: impl Into<String>, options: ContextOptions) -> Self {
        Self {
            run_id: new_run_id(),
            correlation_id: new_correlation_id(),
            initiator: initiator.into(),
            permissions: options.permissions,
            budget: options.budget,
            locale: options.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            observability: options.observability,
            metadata: options.metadata,
        }
    }

    /// Reconstruct a context from explicit parts, validating identity fields
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        run_id: String,
        correlation_id: String,
        initiator: String,
        permissions: Map<String, Value>,
        budget: BudgetLimits,
        locale: String,
        observability: Map<String, Value>,
        metadata: Map<String, Value>,
    ) -> Result<Self, ContextError> {
        if !is_valid_id(&run_id) {
            return Err(ContextError::InvalidId {
                field: "run_id",
                value: run_id,
            });
        }
        if !is_valid_id(&correlation_id) {
            return Err(ContextError::InvalidId {
                field: "correlation_id",
                value: correlation_id,
            });
        }
        Ok(Self {
            run_id,
            correlation_id,
            initiator,
            permissions,
            budget,
            locale,
            observability,
            metadata,
        })
    }

    /// Derive a new context with merged metadata
    ///
    /// Identity, permission, budget, locale, and observability fields are
    /// copied verbatim. `metadata_updates` is merged over the existing
    /// metadata with update keys winning on conflict. The original context
    /// is untouched.
    pub fn propagate(&self, metadata_updates: Map<String, Value>) -> Self {
        let mut metadata = self.metadata.clone();
        for (key, value) in metadata_updates {
            metadata.insert(key, value);
        }
        Self {
            run_id: self.run_id.clone(),
            correlation_id: self.correlation_id.clone(),
            initiator: self.initiator.clone(),
            permissions: self.permissions.clone(),
            budget: self.budget,
            locale: self.locale.clone(),
            observability: self.observability.clone(),
            metadata,
        }
    }

    /// Unique identifier for this execution lifecycle
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Identifier correlating logs, traces, metrics, and audit events
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Identity of the caller (user, system, or service)
    pub fn initiator(&self) -> &str {
        &self.initiator
    }

    /// Effective permission grant set
    pub fn permissions(&self) -> &Map<String, Value> {
        &self.permissions
    }

    /// Declared budget limits
    pub fn budget(&self) -> BudgetLimits {
        self.budget
    }

    /// Language and regional preferences
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Trace/logging propagation metadata
    pub fn observability(&self) -> &Map<String, Value> {
        &self.observability
    }

    /// Free-form contextual data
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}
