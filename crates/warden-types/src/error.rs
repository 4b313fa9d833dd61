//! Canonical error taxonomy
//!
//! Errors are first-class structured objects, not bare exceptions. Every
//! component converts its failures into this shape before they reach the
//! retry policy or the caller. Retryability and severity are fixed per
//! category by the classifier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::new_error_id;

/// Error category enumeration
///
/// The closed set of categories used throughout the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ValidationError,
    PermissionError,
    BudgetExceeded,
    Timeout,
    ExecutionFailure,
    DependencyFailure,
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Structured error
///
/// Retryable errors may be retried by the runtime subject to idempotency
/// and budget constraints; non-retryable errors terminate the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    /// Unique identifier for this error instance
    pub error_id: String,
    /// Category of the error
    pub error_type: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Severity level
    pub severity: ErrorSeverity,
    /// Whether this error is retryable
    pub retryable: bool,
    /// Component that produced the error (e.g. `tool:search`, `runtime:router`)
    pub source: String,
    /// Category-specific context
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Error {
    /// Build an error with a fresh `error_id` and empty metadata
    pub fn new(
        error_type: ErrorCategory,
        message: impl Into<String>,
        severity: ErrorSeverity,
        retryable: bool,
        source: impl Into<String>,
    ) -> Self {
        Self {
            error_id: new_error_id(),
            error_type,
            message: message.into(),
            severity,
            retryable,
            source: source.into(),
            metadata: Map::new(),
        }
    }

    /// Attach category-specific metadata
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_snake_case_discriminants() {
        let error = Error::new(
            ErrorCategory::BudgetExceeded,
            "call budget exhausted",
            ErrorSeverity::High,
            false,
            "governance:budget",
        );
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["error_type"], json!("budget_exceeded"));
        assert_eq!(value["severity"], json!("high"));
        assert_eq!(value["retryable"], json!(false));
    }

    #[test]
    fn severity_is_ordered() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Critical);
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
    }
}
