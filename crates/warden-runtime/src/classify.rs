//! Failure classification into the canonical error taxonomy
//!
//! A pure mapping from [`Failure`] to the structured [`Error`] shape.
//! Classification fixes category, severity, and retryability per failure
//! family; action failures classify by their cause, so a governance
//! denial keeps its category (and its non-retryability) even when it
//! surfaces wrapped by the executor.

use serde_json::{json, Map, Value};

use warden_governance::BudgetError;
use warden_types::{Error, ErrorCategory, ErrorSeverity};

use crate::error::Failure;
use crate::executor::ActionError;

/// Classifies failures into structured errors
pub struct ErrorClassifier;

type Classification = (ErrorCategory, ErrorSeverity, bool, Map<String, Value>);

impl ErrorClassifier {
    /// Classify a failure, preserving its message and family metadata
    pub fn classify(failure: &Failure, source: &str) -> Error {
        let (category, severity, retryable, metadata) = Self::table(failure);
        Error::new(category, failure.to_string(), severity, retryable, source)
            .with_metadata(metadata)
    }

    fn table(failure: &Failure) -> Classification {
        match failure {
            Failure::Permission(err) => (
                ErrorCategory::PermissionError,
                ErrorSeverity::High,
                false,
                Self::meta(
                    "permission",
                    &[
                        ("required_permissions", json!(err.required)),
                        ("missing_permissions", json!(err.missing)),
                        ("available_permissions", json!(err.available)),
                    ],
                ),
            ),
            Failure::Budget(err) => Self::budget(err),
            // Policy misconfiguration is an authorization-layer defect.
            Failure::Policy(_) => (
                ErrorCategory::PermissionError,
                ErrorSeverity::High,
                false,
                Self::meta("policy", &[]),
            ),
            Failure::Audit(err) => (
                ErrorCategory::ExecutionFailure,
                ErrorSeverity::High,
                true,
                Self::meta("audit", &[("decision", json!(err.decision))]),
            ),
            Failure::Routing(_) => (
                ErrorCategory::ValidationError,
                ErrorSeverity::Medium,
                false,
                Self::meta("routing", &[]),
            ),
            Failure::Action(err) => Self::action(err),
            Failure::Lifecycle(_) => (
                ErrorCategory::ValidationError,
                ErrorSeverity::Medium,
                false,
                Self::meta("lifecycle", &[]),
            ),
            Failure::Context(_) => (
                ErrorCategory::ValidationError,
                ErrorSeverity::Medium,
                false,
                Self::meta("context", &[]),
            ),
            Failure::Config(_) => (
                ErrorCategory::ValidationError,
                ErrorSeverity::Medium,
                false,
                Self::meta("config", &[]),
            ),
            Failure::FlowLoad(_) => (
                ErrorCategory::ValidationError,
                ErrorSeverity::Medium,
                false,
                Self::meta("flow_load", &[]),
            ),
            Failure::FlowExecution(_) => (
                ErrorCategory::ExecutionFailure,
                ErrorSeverity::High,
                true,
                Self::meta("flow_execution", &[]),
            ),
            Failure::Timeout(_) => (
                ErrorCategory::Timeout,
                ErrorSeverity::Medium,
                true,
                Self::meta("timeout", &[]),
            ),
            Failure::AgentRun { agent_id, .. } => (
                ErrorCategory::ExecutionFailure,
                ErrorSeverity::High,
                true,
                Self::meta("agent_run", &[("agent_id", json!(agent_id))]),
            ),
            // Conservative default for anything unrecognized.
            Failure::Other(_) => (
                ErrorCategory::ExecutionFailure,
                ErrorSeverity::High,
                true,
                Self::meta("other", &[]),
            ),
        }
    }

    fn budget(err: &BudgetError) -> Classification {
        match err {
            BudgetError::Exhausted {
                dimension,
                limit,
                consumed,
            } => (
                ErrorCategory::BudgetExceeded,
                ErrorSeverity::High,
                false,
                Self::meta(
                    "budget",
                    &[
                        ("budget_type", json!(dimension.to_string())),
                        ("limit", json!(limit)),
                        ("consumed", json!(consumed)),
                    ],
                ),
            ),
            BudgetError::NegativeCost(cost) => (
                ErrorCategory::ValidationError,
                ErrorSeverity::Medium,
                false,
                Self::meta("budget", &[("cost", json!(cost))]),
            ),
        }
    }

    fn action(err: &ActionError) -> Classification {
        match err {
            ActionError::UnknownTool(id) | ActionError::UnknownService(id) => (
                ErrorCategory::ValidationError,
                ErrorSeverity::Medium,
                false,
                Self::meta("action.unknown_target", &[("resource_id", json!(id))]),
            ),
            ActionError::Budget { source, .. } => Self::budget(source),
            ActionError::PermissionDenied { target, source } => (
                ErrorCategory::PermissionError,
                ErrorSeverity::High,
                false,
                Self::meta(
                    "action.permission_denied",
                    &[
                        ("target", json!(target)),
                        ("required_permissions", json!(source.required)),
                        ("missing_permissions", json!(source.missing)),
                        ("available_permissions", json!(source.available)),
                    ],
                ),
            ),
            ActionError::ServicePermissionDenied { service_id, action } => (
                ErrorCategory::PermissionError,
                ErrorSeverity::High,
                false,
                Self::meta(
                    "action.service_permission_denied",
                    &[("service_id", json!(service_id)), ("action", json!(action))],
                ),
            ),
            ActionError::PolicyDenied { action, target }
            | ActionError::ApprovalRequired { action, target } => (
                ErrorCategory::PermissionError,
                ErrorSeverity::High,
                false,
                Self::meta(
                    "action.policy",
                    &[("action", json!(action)), ("target", json!(target))],
                ),
            ),
            ActionError::Policy(_) => (
                ErrorCategory::PermissionError,
                ErrorSeverity::High,
                false,
                Self::meta("action.policy_error", &[]),
            ),
            ActionError::Audit(inner) => (
                ErrorCategory::ExecutionFailure,
                ErrorSeverity::High,
                true,
                Self::meta("action.audit", &[("decision", json!(inner.decision))]),
            ),
            ActionError::InvocationTimeout { target, seconds } => (
                ErrorCategory::Timeout,
                ErrorSeverity::Medium,
                true,
                Self::meta(
                    "action.timeout",
                    &[("target", json!(target)), ("timeout_seconds", json!(seconds))],
                ),
            ),
            ActionError::Invocation { target, .. } => (
                ErrorCategory::ExecutionFailure,
                ErrorSeverity::High,
                true,
                Self::meta("action.invocation", &[("target", json!(target))]),
            ),
        }
    }

    fn meta(kind: &str, entries: &[(&str, Value)]) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("failure_kind".to_string(), json!(kind));
        for (key, value) in entries {
            metadata.insert(key.to_string(), value.clone());
        }
        metadata
    }
}
