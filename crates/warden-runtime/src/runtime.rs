//! Top-level runtime facade
//!
//! Creates and propagates execution contexts, drives the per-run
//! lifecycle, routes to the decision unit, and funnels every requested
//! action through the governed executor. Registries are populated before
//! steady-state traffic and read as snapshots during execution; per-run
//! state (context, lifecycle, budget tracker) is never shared across runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use thiserror::Error;

use warden_governance::BudgetTracker;
use warden_types::{
    Action, Agent, AgentInput, AgentResult, ContextOptions, ExecutionContext, ExecutionStatus,
    InvokeError, NoopSink, ObservabilitySink, Service, Tool,
};

use crate::classify::ErrorClassifier;
use crate::config::WardenConfig;
use crate::error::Failure;
use crate::executor::{ActionError, ActionExecutor, ActionOutcome};
use crate::lifecycle::{LifecycleEvent, LifecycleManager, LifecycleState};
use crate::router::Router;

/// Registration failure during runtime setup
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("tool with id '{0}' is already registered")]
    DuplicateTool(String),

    #[error("service with id '{0}' is already registered")]
    DuplicateService(String),
}

/// A governed execution request
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    /// Explicit agent to run; exact lookup, no fallback
    pub agent_id: Option<String>,
    /// Capability-based selection when no explicit agent is given
    pub required_capabilities: Option<Vec<String>>,
    /// Input payload handed to the agent
    pub input: Map<String, Value>,
    /// Identity of the caller; defaults to `system:runtime`
    pub initiator: Option<String>,
    /// Pre-built context; a fresh one is created when absent
    pub context: Option<ExecutionContext>,
}

/// The governed execution runtime
///
/// All agent invocations go through [`Runtime::execute`]; all direct
/// action invocations (e.g. from an external flow orchestrator) go
/// through [`Runtime::execute_action`]. Both paths share one budget
/// tracker per run.
pub struct Runtime {
    config: WardenConfig,
    agents: RwLock<BTreeMap<String, Arc<dyn Agent>>>,
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
    services: RwLock<BTreeMap<String, Arc<dyn Service>>>,
    sink: Arc<dyn ObservabilitySink>,
    trackers: DashMap<String, Arc<BudgetTracker>>,
    last_run_events: Mutex<Vec<(LifecycleEvent, Map<String, Value>)>>,
}

impl Runtime {
    pub fn new(config: WardenConfig, sink: Arc<dyn ObservabilitySink>) -> Self {
        Self {
            config,
            agents: RwLock::new(BTreeMap::new()),
            tools: RwLock::new(BTreeMap::new()),
            services: RwLock::new(BTreeMap::new()),
            sink,
            trackers: DashMap::new(),
            last_run_events: Mutex::new(Vec::new()),
        }
    }

    /// Runtime with a discarding sink, for tests and local development
    pub fn with_noop_sink(config: WardenConfig) -> Self {
        Self::new(config, Arc::new(NoopSink))
    }

    /// Register an agent; a later registration under the same id replaces
    /// the earlier one
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        let agent_id = agent.agent_id().to_string();
        self.agents.write().insert(agent_id, agent);
    }

    /// Register a tool; duplicate ids are rejected
    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let tool_id = tool.tool_id().to_string();
        let mut tools = self.tools.write();
        if tools.contains_key(&tool_id) {
            return Err(RegistryError::DuplicateTool(tool_id));
        }
        tools.insert(tool_id, tool);
        Ok(())
    }

    /// Register a service; duplicate ids are rejected
    pub fn register_service(&self, service: Arc<dyn Service>) -> Result<(), RegistryError> {
        let service_id = service.service_id().to_string();
        let mut services = self.services.write();
        if services.contains_key(&service_id) {
            return Err(RegistryError::DuplicateService(service_id));
        }
        services.insert(service_id, service);
        Ok(())
    }

    /// Create a context carrying the runtime's default locale
    pub fn create_context(
        &self,
        initiator: impl Into<String>,
        mut options: ContextOptions,
    ) -> ExecutionContext {
        if options.locale.is_none() {
            options.locale = Some(self.config.runtime.default_locale.clone());
        }
        ExecutionContext::create(initiator, options)
    }

    /// Execute an agent and every action it requests
    ///
    /// Routing failures surface before any budget state is touched.
    /// Failures of individual requested actions are classified and
    /// collected into the result's error list; a partially successful
    /// run is a first-class outcome. A failure of the agent itself fails
    /// the run.
    pub async fn execute(&self, request: ExecuteRequest) -> Result<AgentResult, Failure> {
        let ExecuteRequest {
            agent_id,
            required_capabilities,
            input,
            initiator,
            context,
        } = request;

        let context = match context {
            Some(context) => context,
            None => self.create_context(
                initiator.unwrap_or_else(|| "system:runtime".to_string()),
                ContextOptions::default(),
            ),
        };

        let mut lifecycle = LifecycleManager::new(&context);
        let result = self
            .drive(
                &mut lifecycle,
                &context,
                agent_id.as_deref(),
                required_capabilities.as_deref(),
                input,
            )
            .await;

        if !lifecycle.is_terminal() {
            if let Err(err) = lifecycle.transition(LifecycleState::Terminated, Map::new()) {
                tracing::error!(error = %err, "failed to terminate lifecycle");
            }
        }
        tracing::info!(run_id = %context.run_id(), state = ?lifecycle.state(), "runtime execution finished");

        self.trackers.remove(context.run_id());
        *self.last_run_events.lock() = lifecycle.events().to_vec();

        result
    }

    async fn drive(
        &self,
        lifecycle: &mut LifecycleManager,
        context: &ExecutionContext,
        agent_id: Option<&str>,
        required_capabilities: Option<&[String]>,
        input: Map<String, Value>,
    ) -> Result<AgentResult, Failure> {
        tracing::info!(agent_id, run_id = %context.run_id(), "runtime execution started");
        lifecycle.transition(LifecycleState::Ready, Map::new())?;

        // Snapshot of the read-mostly registry; registration during
        // steady-state traffic does not affect a run in flight.
        let router = Router::new(self.agents.read().clone());
        let agent = match router.select(agent_id, required_capabilities, Some(context)) {
            Ok(agent) => agent,
            Err(err) => {
                // Selection failures terminate the run before any budget
                // state exists; no EXECUTING or FAILED state is recorded.
                let mut meta = Map::new();
                meta.insert("error".to_string(), json!(err.to_string()));
                lifecycle.transition(LifecycleState::Terminated, meta)?;
                tracing::error!(error = %err, "agent selection failed");
                return Err(err.into());
            }
        };
        tracing::info!(
            agent_id = agent.agent_id(),
            agent_version = agent.agent_version(),
            "agent selected"
        );

        lifecycle.transition(LifecycleState::Executing, Map::new())?;

        let agent_input = AgentInput {
            payload: input,
            history: None,
        };

        let mut result = match agent.run(agent_input, context).await {
            Ok(result) => result,
            Err(err) => {
                let failure = match err {
                    InvokeError::Timeout { seconds } => Failure::Timeout(format!(
                        "agent '{}' timed out after {seconds}s",
                        agent.agent_id()
                    )),
                    InvokeError::Failed(message) => Failure::AgentRun {
                        agent_id: agent.agent_id().to_string(),
                        message,
                    },
                };
                let mut meta = Map::new();
                meta.insert("error".to_string(), json!(failure.to_string()));
                lifecycle.transition(LifecycleState::Failed, meta)?;
                tracing::error!(agent_id = agent.agent_id(), error = %failure, "agent execution failed");
                return Err(failure);
            }
        };
        tracing::info!(
            agent_id = agent.agent_id(),
            status = ?result.status,
            action_count = result.actions.len(),
            "agent execution completed"
        );

        if !result.actions.is_empty() {
            let executor = self.action_executor(context);
            let actions = result.actions.clone();
            let mut succeeded = 0usize;
            for action in &actions {
                match executor.execute(action).await {
                    Ok(_) => succeeded += 1,
                    Err(err) => {
                        tracing::error!(
                            target = %action.target_resource(),
                            error = %err,
                            "action execution failed"
                        );
                        let failure = Failure::Action(err);
                        result
                            .errors
                            .push(ErrorClassifier::classify(&failure, "runtime:action_executor"));
                    }
                }
            }
            tracing::info!(
                total_actions = actions.len(),
                successful_actions = succeeded,
                "action execution completed"
            );
        }

        match result.status {
            ExecutionStatus::Success => {
                lifecycle.transition(LifecycleState::Completed, Map::new())?;
            }
            status => {
                let mut meta = Map::new();
                meta.insert("status".to_string(), json!(status));
                lifecycle.transition(LifecycleState::Failed, meta)?;
            }
        }

        Ok(result)
    }

    /// Execute one action through the governed pipeline
    ///
    /// The direct invocation path used by external orchestrators. Budget
    /// consumption is shared per run: repeated calls with the same
    /// context accumulate against one tracker.
    pub async fn execute_action(
        &self,
        action: &Action,
        context: &ExecutionContext,
    ) -> Result<ActionOutcome, ActionError> {
        self.action_executor(context).execute(action).await
    }

    /// Lifecycle events of the most recently completed run
    pub fn get_lifecycle_events(&self) -> Vec<(LifecycleEvent, Map<String, Value>)> {
        self.last_run_events.lock().clone()
    }

    fn action_executor(&self, context: &ExecutionContext) -> ActionExecutor {
        ActionExecutor::new(
            context.clone(),
            self.config.governance.clone(),
            self.tools.read().clone(),
            self.services.read().clone(),
            Arc::clone(&self.sink),
            Some(self.tracker_for(context)),
        )
    }

    /// One budget tracker per run, shared across both execution paths
    fn tracker_for(&self, context: &ExecutionContext) -> Arc<BudgetTracker> {
        let entry = self
            .trackers
            .entry(context.run_id().to_string())
            .or_insert_with(|| Arc::new(BudgetTracker::new(context.budget())));
        Arc::clone(entry.value())
    }
}
