//! Governed action execution
//!
//! All tool and service invocations go through this executor; agents
//! cannot call targets directly. Per action the sequence is fixed and
//! non-reorderable: resolve target, budget, permissions, policy, record
//! call, invoke, record cost. No side effect happens before every gate
//! has passed, and every gate decision is audited.
//!
//! Audit-failure policy: on denial paths the governance error is already
//! in flight, so a failing audit emission is logged and suppressed and
//! cannot mask the original error. On the grant path a failing audit
//! emission is fatal and the target is never invoked: an unaudited grant
//! must not pass as audited.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use warden_governance::{
    AuditEmissionError, AuditEmitter, BudgetEnforcer, BudgetError, BudgetTracker,
    GovernanceConfig, PermissionError, PermissionEvaluator, PolicyEngine, PolicyError,
    PolicyOutcome,
};
use warden_types::{
    Action, ExecutionContext, ExecutionStatus, InvokeError, ObservabilitySink, Service,
    ServiceInput, Tool, ToolInput, COST_METRIC,
};

/// Action execution failed
///
/// Governance causes stay visible through the variants so the classifier
/// can keep their category (and with it, their non-retryability).
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("service '{0}' is not registered")]
    UnknownService(String),

    #[error("budget exhausted for {target}: {source}")]
    Budget {
        target: String,
        #[source]
        source: BudgetError,
    },

    #[error("permission denied for {target}: {source}")]
    PermissionDenied {
        target: String,
        #[source]
        source: PermissionError,
    },

    #[error("service '{service_id}' denied action '{action}'")]
    ServicePermissionDenied { service_id: String, action: String },

    #[error("policy denied {action} on {target}")]
    PolicyDenied { action: String, target: String },

    #[error("{action} on {target} requires approval")]
    ApprovalRequired { action: String, target: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Audit(#[from] AuditEmissionError),

    #[error("invocation of {target} timed out after {seconds}s")]
    InvocationTimeout { target: String, seconds: f64 },

    #[error("invocation of {target} failed: {message}")]
    Invocation { target: String, message: String },
}

/// Kind of governed target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tool,
    Service,
}

/// Uniform result envelope for a governed invocation
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    /// Whether the target was a tool or a service
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Identifier of the invoked target
    pub resource_id: String,
    /// Service verb, for service invocations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_action: Option<String>,
    /// Status reported by the target
    pub status: ExecutionStatus,
    /// Structured output from the target
    pub output: Map<String, Value>,
    /// Errors reported by the target
    pub errors: Vec<warden_types::Error>,
    /// Metrics reported by the target
    pub metrics: HashMap<String, f64>,
}

/// Executes actions requested by agents under full governance
///
/// Constructed once per run; the budget tracker it carries is the run's
/// shared tracker, so consumption accumulates across all of the run's
/// actions.
pub struct ActionExecutor {
    context: ExecutionContext,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    services: BTreeMap<String, Arc<dyn Service>>,
    permissions: PermissionEvaluator,
    policy: PolicyEngine,
    audit: AuditEmitter,
    budget: Option<(Arc<BudgetTracker>, BudgetEnforcer)>,
}

impl ActionExecutor {
    pub fn new(
        context: ExecutionContext,
        governance: GovernanceConfig,
        tools: BTreeMap<String, Arc<dyn Tool>>,
        services: BTreeMap<String, Arc<dyn Service>>,
        sink: Arc<dyn ObservabilitySink>,
        budget_tracker: Option<Arc<BudgetTracker>>,
    ) -> Self {
        let permissions = PermissionEvaluator::new(&context);
        let policy = PolicyEngine::new(governance);
        let audit = AuditEmitter::new(context.clone(), sink);
        let budget = budget_tracker
            .map(|tracker| (Arc::clone(&tracker), BudgetEnforcer::new(tracker)));
        Self {
            context,
            tools,
            services,
            permissions,
            policy,
            audit,
            budget,
        }
    }

    /// Execute one governed action
    pub async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        match action {
            Action::Tool {
                tool_id,
                payload,
                timeout,
                retry_policy,
            } => {
                self.execute_tool(tool_id, payload, *timeout, retry_policy.clone())
                    .await
            }
            Action::Service {
                service_id,
                action,
                payload,
            } => self.execute_service(service_id, action, payload).await,
        }
    }

    async fn execute_tool(
        &self,
        tool_id: &str,
        payload: &Map<String, Value>,
        timeout: Option<f64>,
        retry_policy: Option<Map<String, Value>>,
    ) -> Result<ActionOutcome, ActionError> {
        let target = format!("tool:{tool_id}");

        // Unknown target fails before any governance check runs.
        let tool = self
            .tools
            .get(tool_id)
            .cloned()
            .ok_or_else(|| ActionError::UnknownTool(tool_id.to_string()))?;

        self.check_budget(&target)?;

        let required = tool.permissions_required();
        let permission_label = (!required.is_empty()).then(|| required.join(","));
        if let Err(cause) = self
            .permissions
            .check(&required, Some(tool_id), Some("tool"))
        {
            self.audit_denial(|| {
                self.audit.permission_decision(
                    "tool.execute",
                    &target,
                    "denied",
                    permission_label.clone(),
                )
            });
            return Err(ActionError::PermissionDenied {
                target,
                source: cause,
            });
        }
        self.audit.permission_decision(
            "tool.execute",
            &target,
            "allowed",
            permission_label,
        )?;

        self.check_policy("tool.execute", tool_id, "tool", &target)?;

        if let Some((tracker, _)) = &self.budget {
            tracker.record_call();
        }

        let input = ToolInput {
            payload: payload.clone(),
            timeout,
            retry_policy,
        };

        tracing::info!(tool_id, tool_version = tool.tool_version(), "executing tool");
        let result = tool
            .execute(input, &self.context)
            .await
            .map_err(|err| self.wrap_invocation(&target, err))?;

        self.record_cost(&target, &result.metrics)?;

        tracing::info!(tool_id, status = ?result.status, "tool execution completed");
        Ok(ActionOutcome {
            kind: ActionKind::Tool,
            resource_id: tool_id.to_string(),
            service_action: None,
            status: result.status,
            output: result.output,
            errors: result.errors,
            metrics: result.metrics,
        })
    }

    async fn execute_service(
        &self,
        service_id: &str,
        verb: &str,
        payload: &Map<String, Value>,
    ) -> Result<ActionOutcome, ActionError> {
        let target = format!("service:{service_id}");
        let action_name = format!("service.{verb}");

        let service = self
            .services
            .get(service_id)
            .cloned()
            .ok_or_else(|| ActionError::UnknownService(service_id.to_string()))?;

        self.check_budget(&target)?;

        // Services own their permission model.
        if !service.check_permission(verb, &self.context) {
            self.audit_denial(|| {
                self.audit.permission_decision(
                    &action_name,
                    &target,
                    "denied",
                    Some(verb.to_string()),
                )
            });
            return Err(ActionError::ServicePermissionDenied {
                service_id: service_id.to_string(),
                action: verb.to_string(),
            });
        }
        self.audit
            .permission_decision(&action_name, &target, "allowed", Some(verb.to_string()))?;

        self.check_policy(&action_name, service_id, "service", &target)?;

        if let Some((tracker, _)) = &self.budget {
            tracker.record_call();
        }

        let input = ServiceInput {
            action: verb.to_string(),
            payload: payload.clone(),
        };

        tracing::info!(
            service_id,
            service_version = service.service_version(),
            action = verb,
            "executing service action"
        );
        let result = service
            .execute(input, &self.context)
            .await
            .map_err(|err| self.wrap_invocation(&target, err))?;

        self.record_cost(&target, &result.metrics)?;

        tracing::info!(service_id, action = verb, status = ?result.status, "service action completed");
        Ok(ActionOutcome {
            kind: ActionKind::Service,
            resource_id: service_id.to_string(),
            service_action: Some(verb.to_string()),
            status: result.status,
            output: result.output,
            errors: result.errors,
            metrics: result.metrics,
        })
    }

    /// Budget gate; exhaustion is audited best-effort before failing
    fn check_budget(&self, target: &str) -> Result<(), ActionError> {
        let Some((_, enforcer)) = &self.budget else {
            return Ok(());
        };
        if let Err(cause) = enforcer.check() {
            if let BudgetError::Exhausted {
                dimension,
                limit,
                consumed,
            } = &cause
            {
                self.audit_denial(|| self.audit.budget_exhaustion(*dimension, *limit, *consumed));
            }
            return Err(ActionError::Budget {
                target: target.to_string(),
                source: cause,
            });
        }
        Ok(())
    }

    /// Policy gate; deny and require-approval are hard stops
    fn check_policy(
        &self,
        action_name: &str,
        resource_id: &str,
        resource_type: &str,
        target: &str,
    ) -> Result<(), ActionError> {
        let outcome =
            self.policy
                .evaluate(action_name, Some(resource_id), Some(resource_type), None)?;
        match outcome {
            PolicyOutcome::Deny => {
                self.audit_denial(|| {
                    self.audit.policy_decision(
                        action_name,
                        target,
                        "deny",
                        Some(action_name.to_string()),
                    )
                });
                Err(ActionError::PolicyDenied {
                    action: action_name.to_string(),
                    target: target.to_string(),
                })
            }
            PolicyOutcome::RequireApproval => {
                // v1 has no asynchronous approval channel.
                self.audit_denial(|| {
                    self.audit.policy_decision(
                        action_name,
                        target,
                        "require_approval",
                        Some(action_name.to_string()),
                    )
                });
                Err(ActionError::ApprovalRequired {
                    action: action_name.to_string(),
                    target: target.to_string(),
                })
            }
            PolicyOutcome::Allow => {
                self.audit.policy_decision(
                    action_name,
                    target,
                    "allow",
                    Some(action_name.to_string()),
                )?;
                Ok(())
            }
        }
    }

    /// Best-effort audit on a denial path: the governance error already in
    /// flight must not be masked by an emission failure.
    fn audit_denial(&self, emit: impl FnOnce() -> Result<(), AuditEmissionError>) {
        if let Err(err) = emit() {
            tracing::error!(error = %err, "audit emission failed while reporting a denial");
        }
    }

    fn record_cost(
        &self,
        target: &str,
        metrics: &HashMap<String, f64>,
    ) -> Result<(), ActionError> {
        if let (Some((tracker, _)), Some(cost)) = (&self.budget, metrics.get(COST_METRIC)) {
            tracker
                .record_cost(*cost)
                .map_err(|source| ActionError::Budget {
                    target: target.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Wrap a target failure; native error types never leak to the caller
    fn wrap_invocation(&self, target: &str, err: InvokeError) -> ActionError {
        tracing::error!(target, error = %err, "target invocation failed");
        match err {
            InvokeError::Timeout { seconds } => ActionError::InvocationTimeout {
                target: target.to_string(),
                seconds,
            },
            InvokeError::Failed(message) => ActionError::Invocation {
                target: target.to_string(),
                message,
            },
        }
    }
}
