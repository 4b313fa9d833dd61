//! Actions requested by decision units
//!
//! An action is the only way an agent can ask for a side effect. The
//! variant set is closed and discriminated by an explicit `type` field on
//! the wire. Actions carry no permissions of their own; required
//! permissions are resolved from the registered target descriptor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A requested tool or service invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Invoke a registered tool
    Tool {
        /// Registered tool identifier
        tool_id: String,
        /// Structured input payload for the tool
        #[serde(default)]
        payload: Map<String, Value>,
        /// Optional timeout in seconds, honored by the tool
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<f64>,
        /// Optional per-action retry policy configuration
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_policy: Option<Map<String, Value>>,
    },
    /// Invoke a verb on a registered service
    Service {
        /// Registered service identifier
        service_id: String,
        /// Service verb (e.g. `read`, `write`)
        action: String,
        /// Structured input payload for the verb
        #[serde(default)]
        payload: Map<String, Value>,
    },
}

impl Action {
    /// The governed action name, e.g. `tool.execute` or `service.read`
    pub fn action_name(&self) -> String {
        match self {
            Action::Tool { .. } => "tool.execute".to_string(),
            Action::Service { action, .. } => format!("service.{action}"),
        }
    }

    /// The qualified target resource, e.g. `tool:search` or `service:memory`
    pub fn target_resource(&self) -> String {
        match self {
            Action::Tool { tool_id, .. } => format!("tool:{tool_id}"),
            Action::Service { service_id, .. } => format!("service:{service_id}"),
        }
    }

    /// The bare identifier of the target
    pub fn resource_id(&self) -> &str {
        match self {
            Action::Tool { tool_id, .. } => tool_id,
            Action::Service { service_id, .. } => service_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_actions_are_tagged_by_type() {
        let action = Action::Tool {
            tool_id: "search".to_string(),
            payload: Map::new(),
            timeout: Some(5.0),
            retry_policy: None,
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], json!("tool"));
        assert_eq!(value["tool_id"], json!("search"));

        let back: Action = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn service_actions_round_trip() {
        let raw = json!({
            "type": "service",
            "service_id": "memory",
            "action": "write",
            "payload": {"key": "k", "value": 1},
        });
        let action: Action = serde_json::from_value(raw).unwrap();
        assert_eq!(action.action_name(), "service.write");
        assert_eq!(action.target_resource(), "service:memory");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let raw = json!({"type": "shell", "command": "rm -rf /"});
        assert!(serde_json::from_value::<Action>(raw).is_err());
    }
}
