//! Canonical internal failure type
//!
//! Every component failure converts into [`Failure`] before it reaches the
//! classifier, the retry policy, or the caller. No component outside the
//! classifier/retry pair inspects raw component error types.

use thiserror::Error;

use warden_governance::{AuditEmissionError, BudgetError, PermissionError, PolicyError};
use warden_types::ContextError;

use crate::executor::ActionError;
use crate::lifecycle::LifecycleError;
use crate::router::RoutingError;

/// Aggregated failure from any component of the control plane
///
/// `FlowLoad` and `FlowExecution` carry failures reported by the external
/// declarative orchestrator, which classifies through this taxonomy even
/// though it lives outside the control plane.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Audit(#[from] AuditEmissionError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("configuration invalid: {0}")]
    Config(String),

    #[error("flow definition failed to load: {0}")]
    FlowLoad(String),

    #[error("flow execution failed: {0}")]
    FlowExecution(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("agent '{agent_id}' failed: {message}")]
    AgentRun { agent_id: String, message: String },

    #[error("{0}")]
    Other(String),
}
