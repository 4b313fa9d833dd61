//! Observability sink interface and reference implementations
//!
//! Sinks receive all four signal kinds. Log, trace, and metric emission
//! must never alter execution semantics; audit emission is contractually
//! significant, so only `emit_audit` is fallible.

use parking_lot::Mutex;
use thiserror::Error;

use crate::observability::{AuditEvent, LogEvent, MetricValue, TraceSpan};

/// Failure reported by a sink's audit path
#[derive(Debug, Clone, Error)]
#[error("sink failure: {0}")]
pub struct SinkError(pub String);

/// Destination for observability signals
///
/// Implementations must preserve correlation fields and handle their own
/// backpressure. A sink failure on logs, traces, or metrics is swallowed
/// by the implementation (detectable through its own channels, never
/// through execution); a failure to record an audit event surfaces to the
/// caller.
pub trait ObservabilitySink: Send + Sync {
    /// Emit a structured log event
    fn emit_log(&self, event: LogEvent);

    /// Emit a trace span
    fn emit_trace(&self, span: TraceSpan);

    /// Emit a metric value
    fn emit_metric(&self, metric: MetricValue);

    /// Record an audit event
    fn emit_audit(&self, event: AuditEvent) -> Result<(), SinkError>;
}

/// Sink that discards every signal
///
/// For tests and local development only; production audit events must not
/// go through a discarding sink.
#[derive(Debug, Default, Clone)]
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn emit_log(&self, _event: LogEvent) {}

    fn emit_trace(&self, _span: TraceSpan) {}

    fn emit_metric(&self, _metric: MetricValue) {}

    fn emit_audit(&self, _event: AuditEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Append-only in-memory sink
///
/// Captures every signal for later inspection. Used by tests to assert on
/// the audit record of a run.
#[derive(Debug, Default)]
pub struct MemorySink {
    logs: Mutex<Vec<LogEvent>>,
    traces: Mutex<Vec<TraceSpan>>,
    metrics: Mutex<Vec<MetricValue>>,
    audits: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of captured log events
    pub fn logs(&self) -> Vec<LogEvent> {
        self.logs.lock().clone()
    }

    /// Snapshot of captured trace spans
    pub fn traces(&self) -> Vec<TraceSpan> {
        self.traces.lock().clone()
    }

    /// Snapshot of captured metric values
    pub fn metrics(&self) -> Vec<MetricValue> {
        self.metrics.lock().clone()
    }

    /// Snapshot of captured audit events, in emission order
    pub fn audits(&self) -> Vec<AuditEvent> {
        self.audits.lock().clone()
    }
}

impl ObservabilitySink for MemorySink {
    fn emit_log(&self, event: LogEvent) {
        self.logs.lock().push(event);
    }

    fn emit_trace(&self, span: TraceSpan) {
        self.traces.lock().push(span);
    }

    fn emit_metric(&self, metric: MetricValue) {
        self.metrics.lock().push(metric);
    }

    fn emit_audit(&self, event: AuditEvent) -> Result<(), SinkError> {
        self.audits.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{ComponentType, CorrelationFields};

    fn audit(outcome: &str) -> AuditEvent {
        AuditEvent {
            correlation: CorrelationFields::now(
                "run", "corr", ComponentType::Runtime, "test", "0.1.0",
            ),
            initiator_identity: "user:alice".to_string(),
            action: "tool.execute".to_string(),
            target_resource: "tool:search".to_string(),
            decision_outcome: outcome.to_string(),
            policy_or_permission: None,
        }
    }

    #[test]
    fn memory_sink_preserves_emission_order() {
        let sink = MemorySink::new();
        sink.emit_audit(audit("allowed")).unwrap();
        sink.emit_audit(audit("denied")).unwrap();
        let audits = sink.audits();
        assert_eq!(audits.len(), 2);
        assert_eq!(audits[0].decision_outcome, "allowed");
        assert_eq!(audits[1].decision_outcome, "denied");
    }
}
