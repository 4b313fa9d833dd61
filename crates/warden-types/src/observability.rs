//! Observability signal schemas
//!
//! Every signal (log, trace, metric, audit) carries the full correlation
//! field set so a run can be reconstructed end to end. Audit events are
//! the immutable record of governance decisions and cannot be disabled in
//! production.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Component type emitting a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Runtime,
    Agent,
    Tool,
    Service,
    Flow,
}

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "DEBUG")]
    Debug,
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "ERROR")]
    Error,
}

/// Required correlation fields for all observability signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFields {
    /// Unique identifier for a single execution lifecycle
    pub run_id: String,
    /// Identifier correlating logs, traces, metrics, and audit events
    pub correlation_id: String,
    /// Type of component emitting the signal
    pub component_type: ComponentType,
    /// Unique identifier of the component
    pub component_id: String,
    /// Version identifier of the component
    pub component_version: String,
    /// ISO 8601 timestamp of when the signal was emitted
    pub timestamp: String,
}

impl CorrelationFields {
    /// Build correlation fields stamped with the current time
    pub fn now(
        run_id: impl Into<String>,
        correlation_id: impl Into<String>,
        component_type: ComponentType,
        component_id: impl Into<String>,
        component_version: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            correlation_id: correlation_id.into(),
            component_type,
            component_id: component_id.into(),
            component_version: component_version.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Structured log event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Required correlation fields
    pub correlation: CorrelationFields,
    /// Log level
    pub level: LogLevel,
    /// Concise and descriptive log message
    pub message: String,
    /// Additional log context (no sensitive data by default)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Attributes attached to a trace span
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanAttributes {
    /// Component identifiers (agent_id, tool_id, ...)
    #[serde(default)]
    pub component_identifiers: HashMap<String, String>,
    /// Execution status (e.g. `success`, `error`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<String>,
    /// Duration of the operation in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Error classification, if applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_classification: Option<Map<String, Value>>,
    /// Budget impact, if applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_impact: Option<Map<String, Value>>,
}

/// Trace span describing execution flow and causality
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    /// Required correlation fields
    pub correlation: CorrelationFields,
    /// Span name (e.g. `run`, `agent.execution`, `tool.invoke`)
    pub span_name: String,
    /// Identifier of the parent span, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    /// Span attributes
    #[serde(default)]
    pub attributes: SpanAttributes,
}

/// A single metric data point
///
/// Labels must avoid high-cardinality identifiers; `run_id` belongs in the
/// correlation fields, never in a label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    /// Required correlation fields
    pub correlation: CorrelationFields,
    /// Metric name (e.g. `execution.count`, `latency.histogram`)
    pub metric_name: String,
    /// Metric type (counter, histogram, gauge)
    pub metric_type: String,
    /// Metric value
    pub value: f64,
    /// Metric labels
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Immutable record of a security- or side-effect-relevant decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Required correlation fields
    pub correlation: CorrelationFields,
    /// Identity of the initiator (from the execution context)
    pub initiator_identity: String,
    /// Action decided on (e.g. `tool.execute`, `service.read`)
    pub action: String,
    /// Target resource identifier (e.g. `tool:search`, `service:memory`)
    pub target_resource: String,
    /// Decision outcome (e.g. `allowed`, `denied`, `require_approval`)
    pub decision_outcome: String,
    /// Associated policy or permission identifier, if applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_or_permission: Option<String>,
}
