//! Policy evaluation with explicit outcomes
//!
//! Policies are evaluated at well-defined enforcement points and return
//! one of exactly three outcomes: allow, deny, or require-approval. An
//! outcome that does not parse is a configuration defect, not a denial.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Terminal decision of a policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcome {
    Allow,
    Deny,
    RequireApproval,
}

impl PolicyOutcome {
    /// Parse a configured outcome string
    pub fn parse(outcome: &str) -> Option<Self> {
        match outcome {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            "require_approval" => Some(Self::RequireApproval),
            _ => None,
        }
    }

    /// The wire/audit spelling of the outcome
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::RequireApproval => "require_approval",
        }
    }
}

/// A configured policy rule
///
/// A rule without an explicit outcome defaults to allow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Configured outcome: `allow`, `deny`, or `require_approval`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl PolicyRule {
    pub fn allow() -> Self {
        Self {
            outcome: Some("allow".to_string()),
        }
    }

    pub fn deny() -> Self {
        Self {
            outcome: Some("deny".to_string()),
        }
    }

    pub fn require_approval() -> Self {
        Self {
            outcome: Some("require_approval".to_string()),
        }
    }
}

/// Governance configuration consumed by the policy engine
///
/// Policies are keyed by action pattern: an exact action name such as
/// `tool.execute`, or a trailing-wildcard pattern such as `tool.*`. The
/// ordered map keeps wildcard scanning reproducible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Action pattern -> rule
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyRule>,
}

/// Policy evaluation failed (a configuration defect, not a denial)
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    #[error("invalid policy outcome '{outcome}' for policy '{policy}': must be one of allow, deny, require_approval")]
    InvalidOutcome { policy: String, outcome: String },
}

/// Deterministic policy engine
///
/// Lookup order: exact action match, then the first configured `.*`
/// pattern (in key order) whose prefix matches the action, then a default
/// of allow.
pub struct PolicyEngine {
    config: GovernanceConfig,
}

impl PolicyEngine {
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config }
    }

    /// Evaluate the policy outcome for an action
    pub fn evaluate(
        &self,
        action: &str,
        resource_id: Option<&str>,
        resource_type: Option<&str>,
        _metadata: Option<&Map<String, Value>>,
    ) -> Result<PolicyOutcome, PolicyError> {
        if self.config.policies.is_empty() {
            tracing::debug!(action, resource_id, resource_type, "no policies configured, defaulting to allow");
            return Ok(PolicyOutcome::Allow);
        }

        if let Some(rule) = self.config.policies.get(action) {
            let outcome = Self::rule_outcome(action, rule)?;
            self.log_outcome(action, resource_id, resource_type, outcome);
            return Ok(outcome);
        }

        for (pattern, rule) in &self.config.policies {
            if Self::matches_pattern(action, pattern) {
                let outcome = Self::rule_outcome(pattern, rule)?;
                self.log_outcome(action, resource_id, resource_type, outcome);
                return Ok(outcome);
            }
        }

        tracing::debug!(action, resource_id, resource_type, "no matching policy, defaulting to allow");
        Ok(PolicyOutcome::Allow)
    }

    /// Whether the outcome for the action is allow
    pub fn is_allowed(
        &self,
        action: &str,
        resource_id: Option<&str>,
        resource_type: Option<&str>,
    ) -> Result<bool, PolicyError> {
        Ok(self.evaluate(action, resource_id, resource_type, None)? == PolicyOutcome::Allow)
    }

    /// Whether the outcome for the action is require-approval
    pub fn requires_approval(
        &self,
        action: &str,
        resource_id: Option<&str>,
        resource_type: Option<&str>,
    ) -> Result<bool, PolicyError> {
        Ok(self.evaluate(action, resource_id, resource_type, None)?
            == PolicyOutcome::RequireApproval)
    }

    fn rule_outcome(policy: &str, rule: &PolicyRule) -> Result<PolicyOutcome, PolicyError> {
        match rule.outcome.as_deref() {
            None => Ok(PolicyOutcome::Allow),
            Some(outcome) => {
                PolicyOutcome::parse(outcome).ok_or_else(|| PolicyError::InvalidOutcome {
                    policy: policy.to_string(),
                    outcome: outcome.to_string(),
                })
            }
        }
    }

    fn matches_pattern(action: &str, pattern: &str) -> bool {
        match pattern.strip_suffix(".*") {
            Some(prefix) => action
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.')),
            None => pattern == action,
        }
    }

    fn log_outcome(
        &self,
        action: &str,
        resource_id: Option<&str>,
        resource_type: Option<&str>,
        outcome: PolicyOutcome,
    ) {
        match outcome {
            PolicyOutcome::Allow => {
                tracing::info!(action, resource_id, resource_type, outcome = outcome.as_str(), "policy evaluated");
            }
            _ => {
                tracing::warn!(action, resource_id, resource_type, outcome = outcome.as_str(), "policy evaluated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(policies: &[(&str, PolicyRule)]) -> PolicyEngine {
        PolicyEngine::new(GovernanceConfig {
            policies: policies
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        })
    }

    #[test]
    fn no_policies_defaults_to_allow() {
        let engine = engine(&[]);
        assert_eq!(
            engine.evaluate("tool.execute", None, None, None).unwrap(),
            PolicyOutcome::Allow
        );
    }

    #[test]
    fn exact_match_wins_over_wildcard() {
        let engine = engine(&[
            ("tool.execute", PolicyRule::allow()),
            ("tool.*", PolicyRule::deny()),
        ]);
        assert_eq!(
            engine.evaluate("tool.execute", None, None, None).unwrap(),
            PolicyOutcome::Allow
        );
        assert_eq!(
            engine.evaluate("tool.read", None, None, None).unwrap(),
            PolicyOutcome::Deny
        );
    }

    #[test]
    fn wildcard_does_not_match_its_bare_prefix() {
        let engine = engine(&[("tool.*", PolicyRule::deny())]);
        assert_eq!(
            engine.evaluate("tool", None, None, None).unwrap(),
            PolicyOutcome::Allow
        );
        assert_eq!(
            engine.evaluate("toolbox.execute", None, None, None).unwrap(),
            PolicyOutcome::Allow
        );
    }

    #[test]
    fn wildcard_scan_order_is_lexicographic() {
        let engine = engine(&[
            ("service.*", PolicyRule::require_approval()),
            ("service.memory.*", PolicyRule::deny()),
        ]);
        // "service.*" sorts first and matches, so it decides.
        assert_eq!(
            engine
                .evaluate("service.memory.write", None, None, None)
                .unwrap(),
            PolicyOutcome::RequireApproval
        );
    }

    #[test]
    fn rule_without_outcome_defaults_to_allow() {
        let engine = engine(&[("tool.execute", PolicyRule::default())]);
        assert_eq!(
            engine.evaluate("tool.execute", None, None, None).unwrap(),
            PolicyOutcome::Allow
        );
    }

    #[test]
    fn invalid_outcome_is_a_policy_error_not_a_denial() {
        let engine = engine(&[(
            "tool.execute",
            PolicyRule {
                outcome: Some("maybe".to_string()),
            },
        )]);
        let err = engine.evaluate("tool.execute", None, None, None).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidOutcome { .. }));
    }

    #[test]
    fn convenience_queries_are_pure() {
        let engine = engine(&[("tool.execute", PolicyRule::require_approval())]);
        assert!(engine.requires_approval("tool.execute", None, None).unwrap());
        assert!(engine.requires_approval("tool.execute", None, None).unwrap());
        assert!(!engine.is_allowed("tool.execute", None, None).unwrap());
    }
}
