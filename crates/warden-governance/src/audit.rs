//! Audit event emission for governance decisions
//!
//! Every governance decision point produces exactly one audit event,
//! grants included, so the audit record reconstructs the full decision
//! history of a run. Emission failure is itself a distinguished failure:
//! an unaudited governed decision must never silently pass as audited.

use std::sync::Arc;

use thiserror::Error;

use warden_types::{
    AuditEvent, ComponentType, CorrelationFields, ExecutionContext, ObservabilitySink, SinkError,
};

use crate::budget::BudgetDimension;

const COMPONENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// An audit event could not be recorded
#[derive(Debug, Clone, Error)]
#[error("failed to emit audit event for {decision}: {source}")]
pub struct AuditEmissionError {
    /// Which decision family failed to record
    pub decision: &'static str,
    #[source]
    pub source: SinkError,
}

/// Emits audit events for governance decisions through the sink
///
/// Correlation fields are built fresh per event with the current
/// timestamp; identity fields come from the execution context.
pub struct AuditEmitter {
    context: ExecutionContext,
    sink: Arc<dyn ObservabilitySink>,
}

impl AuditEmitter {
    pub fn new(context: ExecutionContext, sink: Arc<dyn ObservabilitySink>) -> Self {
        Self { context, sink }
    }

    /// Record a permission decision (grant or denial)
    pub fn permission_decision(
        &self,
        action: &str,
        target_resource: &str,
        decision_outcome: &str,
        permission: Option<String>,
    ) -> Result<(), AuditEmissionError> {
        self.emit(
            "permission decision",
            "governance:permissions",
            action,
            target_resource,
            decision_outcome,
            permission,
        )
    }

    /// Record a policy decision (allow, deny, or require_approval)
    pub fn policy_decision(
        &self,
        action: &str,
        target_resource: &str,
        decision_outcome: &str,
        policy: Option<String>,
    ) -> Result<(), AuditEmissionError> {
        self.emit(
            "policy decision",
            "governance:policy",
            action,
            target_resource,
            decision_outcome,
            policy,
        )
    }

    /// Record a budget exhaustion
    pub fn budget_exhaustion(
        &self,
        dimension: BudgetDimension,
        limit: f64,
        consumed: f64,
    ) -> Result<(), AuditEmissionError> {
        tracing::warn!(%dimension, limit, consumed, "auditing budget exhaustion");
        self.emit(
            "budget exhaustion",
            "governance:budget",
            &format!("budget.exhausted.{dimension}"),
            &format!("budget:{dimension}"),
            "denied",
            None,
        )
    }

    /// Record any other governance decision
    pub fn governance_decision(
        &self,
        action: &str,
        target_resource: &str,
        decision_outcome: &str,
        policy_or_permission: Option<String>,
        component_id: &str,
    ) -> Result<(), AuditEmissionError> {
        self.emit(
            "governance decision",
            component_id,
            action,
            target_resource,
            decision_outcome,
            policy_or_permission,
        )
    }

    fn emit(
        &self,
        decision: &'static str,
        component_id: &str,
        action: &str,
        target_resource: &str,
        decision_outcome: &str,
        policy_or_permission: Option<String>,
    ) -> Result<(), AuditEmissionError> {
        let event = AuditEvent {
            correlation: CorrelationFields::now(
                self.context.run_id(),
                self.context.correlation_id(),
                ComponentType::Runtime,
                component_id,
                COMPONENT_VERSION,
            ),
            initiator_identity: self.context.initiator().to_string(),
            action: action.to_string(),
            target_resource: target_resource.to_string(),
            decision_outcome: decision_outcome.to_string(),
            policy_or_permission,
        };

        self.sink
            .emit_audit(event)
            .map_err(|source| AuditEmissionError { decision, source })
    }
}
