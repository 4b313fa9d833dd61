//! Permission evaluation against the context grant set
//!
//! Permissions are resolved before execution; a missing permission fails
//! the whole check immediately, reporting the complete missing set.

use serde_json::{Map, Value};
use thiserror::Error;

use warden_types::ExecutionContext;

/// Reserved grant key holding an explicit permission list
pub const PERMISSION_LIST_KEY: &str = "permissions";

/// Required permissions are missing or insufficient
#[derive(Debug, Clone, Error)]
#[error("missing required permissions: {missing:?}; available permissions: {available:?}")]
pub struct PermissionError {
    /// Permissions that were required
    pub required: Vec<String>,
    /// The complete set of required permissions not granted
    pub missing: Vec<String>,
    /// Top-level keys of the context grant set
    pub available: Vec<String>,
}

/// Evaluates required permissions against an execution context
///
/// The grant set is semi-structured; three forms are understood, resolved
/// in order with the first match deciding:
///
/// 1. a direct key whose boolean value decides (a present non-boolean
///    value counts as granted)
/// 2. the reserved `"permissions"` key holding an explicit list
/// 3. one level of nested per-resource maps, with the same boolean
///    semantics as (1)
pub struct PermissionEvaluator {
    grants: Map<String, Value>,
    initiator: String,
}

impl PermissionEvaluator {
    pub fn new(context: &ExecutionContext) -> Self {
        Self {
            grants: context.permissions().clone(),
            initiator: context.initiator().to_string(),
        }
    }

    /// Check that every required permission is granted
    ///
    /// An empty requirement always passes. All-or-nothing: if any required
    /// permission is missing the whole check fails, and the error carries
    /// every missing name, not just the first.
    pub fn check(
        &self,
        required: &[String],
        resource_id: Option<&str>,
        resource_type: Option<&str>,
    ) -> Result<(), PermissionError> {
        if required.is_empty() {
            return Ok(());
        }

        let missing: Vec<String> = required
            .iter()
            .filter(|name| !self.has_permission(name))
            .cloned()
            .collect();

        if !missing.is_empty() {
            tracing::warn!(
                initiator = %self.initiator,
                ?required,
                ?missing,
                resource_id,
                resource_type,
                "permission check failed"
            );
            return Err(PermissionError {
                required: required.to_vec(),
                missing,
                available: self.grants.keys().cloned().collect(),
            });
        }

        tracing::debug!(?required, resource_id, resource_type, "permission check passed");
        Ok(())
    }

    fn has_permission(&self, name: &str) -> bool {
        // Form 1: direct key; a present value decides, boolean or not.
        if let Some(value) = self.grants.get(name) {
            return match value {
                Value::Bool(granted) => *granted,
                _ => true,
            };
        }

        // Form 2: explicit list under the reserved key. A present list
        // decides membership; it does not fall through to nested maps.
        if let Some(value) = self.grants.get(PERMISSION_LIST_KEY) {
            if let Value::Array(names) = value {
                return names.iter().any(|entry| entry.as_str() == Some(name));
            }
        }

        // Form 3: one level of nested per-resource maps.
        for value in self.grants.values() {
            if let Value::Object(nested) = value {
                if let Some(inner) = nested.get(name) {
                    return match inner {
                        Value::Bool(granted) => *granted,
                        _ => true,
                    };
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_types::ContextOptions;

    fn evaluator(permissions: Value) -> PermissionEvaluator {
        let Value::Object(permissions) = permissions else {
            panic!("grants must be an object");
        };
        let context = ExecutionContext::create(
            "user:alice",
            ContextOptions {
                permissions,
                ..ContextOptions::default()
            },
        );
        PermissionEvaluator::new(&context)
    }

    fn required(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn empty_requirement_always_passes() {
        let eval = evaluator(json!({}));
        assert!(eval.check(&[], None, None).is_ok());
    }

    #[test]
    fn boolean_flag_form() {
        let eval = evaluator(json!({"read": true, "write": false}));
        assert!(eval.check(&required(&["read"]), None, None).is_ok());
        assert!(eval.check(&required(&["write"]), None, None).is_err());
    }

    #[test]
    fn present_non_boolean_counts_as_granted() {
        let eval = evaluator(json!({"read": "scoped:docs"}));
        assert!(eval.check(&required(&["read"]), None, None).is_ok());
    }

    #[test]
    fn list_form() {
        let eval = evaluator(json!({"permissions": ["read", "write"]}));
        assert!(eval.check(&required(&["read", "write"]), None, None).is_ok());
        assert!(eval.check(&required(&["delete"]), None, None).is_err());
    }

    #[test]
    fn nested_map_form() {
        let eval = evaluator(json!({"tools": {"search": true, "shell": false}}));
        assert!(eval.check(&required(&["search"]), None, None).is_ok());
        assert!(eval.check(&required(&["shell"]), None, None).is_err());
    }

    #[test]
    fn all_or_nothing_reports_complete_missing_set() {
        let eval = evaluator(json!({"read": true}));
        let err = eval
            .check(&required(&["read", "write"]), Some("search"), Some("tool"))
            .unwrap_err();
        assert_eq!(err.missing, vec!["write".to_string()]);
        assert_eq!(err.available, vec!["read".to_string()]);

        let err = eval
            .check(&required(&["write", "delete"]), None, None)
            .unwrap_err();
        assert_eq!(err.missing, vec!["write".to_string(), "delete".to_string()]);
    }

    #[test]
    fn direct_key_decides_before_list_form() {
        // "read" granted as a flag wins; "write" denied as a flag does not
        // fall through to the list.
        let eval = evaluator(json!({"write": false, "permissions": ["write"]}));
        assert!(eval.check(&required(&["write"]), None, None).is_err());
    }
}
