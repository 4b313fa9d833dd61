//! Capability contracts for agents, tools, and services
//!
//! Decision units and side-effecting units are arbitrary user code behind
//! these fixed contracts. The runtime is the only caller: agents never
//! invoke tools or services directly, and tools/services never route to
//! each other.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::action::Action;
use crate::context::ExecutionContext;
use crate::error::Error as StructuredError;

/// Metrics key recorded against the budget tracker when present
pub const COST_METRIC: &str = "cost";

/// Execution status reported by agents, tools, and services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Pending,
    Timeout,
}

/// Failure raised by a unit during invocation
///
/// The variant set is deliberately small: the runtime wraps anything a
/// target produces, so unit implementations reduce their failures to a
/// timeout or an opaque message.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// The unit gave up after the honored timeout elapsed
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: f64 },
    /// Any other unit failure
    #[error("{0}")]
    Failed(String),
}

/// Structured input for agent execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInput {
    /// Structured input data
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Optional prior interaction context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Map<String, Value>>>,
}

/// Structured output from agent execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Execution status
    pub status: ExecutionStatus,
    /// Structured output data
    #[serde(default)]
    pub output: Map<String, Value>,
    /// Actions the agent requests the runtime to perform
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Errors encountered during execution
    #[serde(default)]
    pub errors: Vec<StructuredError>,
    /// Execution metrics (latency, token usage, cost, ...)
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl AgentResult {
    /// A successful result with the given output and no actions
    pub fn success(output: Map<String, Value>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output,
            actions: Vec::new(),
            errors: Vec::new(),
            metrics: HashMap::new(),
        }
    }
}

/// Structured input for tool execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    /// Structured input data for the tool
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Timeout in seconds the tool should honor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Per-action retry policy configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<Map<String, Value>>,
}

/// Structured output from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Execution status
    pub status: ExecutionStatus,
    /// Structured output data
    #[serde(default)]
    pub output: Map<String, Value>,
    /// Errors encountered during execution
    #[serde(default)]
    pub errors: Vec<StructuredError>,
    /// Execution metrics; the `cost` key feeds budget accounting
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

/// Structured input for service execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInput {
    /// Verb to execute (e.g. `read`, `write`)
    pub action: String,
    /// Structured input data for the verb
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// Structured output from service execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResult {
    /// Execution status
    pub status: ExecutionStatus,
    /// Structured output data
    #[serde(default)]
    pub output: Map<String, Value>,
    /// Errors encountered during execution
    #[serde(default)]
    pub errors: Vec<StructuredError>,
    /// Execution metrics; the `cost` key feeds budget accounting
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

/// Decision-making unit operating purely within the execution context
///
/// Agents interpret inputs, decide which actions to take, and produce
/// structured outputs. They must not access external systems directly,
/// manage retries, or mutate shared state.
#[async_trait]
pub trait Agent: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this agent
    fn agent_id(&self) -> &str;

    /// Version identifier for this agent
    fn agent_version(&self) -> &str;

    /// Capabilities this agent provides
    fn capabilities(&self) -> Vec<String>;

    /// Run the agent against the given input and context
    async fn run(
        &self,
        input: AgentInput,
        context: &ExecutionContext,
    ) -> Result<AgentResult, InvokeError>;
}

/// Side-effecting unit invoked only through the governed pipeline
///
/// Tools declare every permission they require; the runtime checks the
/// declaration against the context before the tool ever runs.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique identifier for this tool
    fn tool_id(&self) -> &str;

    /// Version identifier for this tool
    fn tool_version(&self) -> &str;

    /// Permissions required to execute this tool
    fn permissions_required(&self) -> Vec<String>;

    /// Execute the tool with the given input and context
    async fn execute(
        &self,
        input: ToolInput,
        context: &ExecutionContext,
    ) -> Result<ToolResult, InvokeError>;
}

/// Governed access to a shared capability (state, memory, ...)
///
/// Services own their permission model: the runtime asks the service
/// whether a verb is permitted for the context before invoking it.
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique identifier for this service
    fn service_id(&self) -> &str;

    /// Version identifier for this service
    fn service_version(&self) -> &str;

    /// Capabilities this service provides
    fn capabilities(&self) -> Vec<String>;

    /// Whether the given verb is permitted for the context
    fn check_permission(&self, action: &str, context: &ExecutionContext) -> bool;

    /// Execute a service verb with the given input and context
    async fn execute(
        &self,
        input: ServiceInput,
        context: &ExecutionContext,
    ) -> Result<ServiceResult, InvokeError>;
}
