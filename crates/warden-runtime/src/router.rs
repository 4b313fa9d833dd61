//! Deterministic decision-unit routing
//!
//! Selection is by explicit id or by capability superset, nothing else.
//! Capability ties break by ascending agent id, never by registration
//! order or heuristic. Implicit or semantic routing is disallowed by
//! contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use warden_types::{Agent, ExecutionContext};

/// Agent selection failed
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("agent '{0}' is not registered")]
    UnknownAgent(String),

    #[error("no agent provides the required capabilities: {0:?}")]
    NoCapabilityMatch(Vec<String>),

    #[error("agent selection requires an agent id or required capabilities; implicit routing is not allowed")]
    NoSelector,
}

/// Deterministic agent router over a snapshot of the registry
pub struct Router {
    agents: BTreeMap<String, Arc<dyn Agent>>,
}

impl Router {
    pub fn new(agents: BTreeMap<String, Arc<dyn Agent>>) -> Self {
        Self { agents }
    }

    /// Select an agent by explicit id or by required capabilities
    ///
    /// An explicit id is an exact lookup with no fallback. A capability
    /// requirement selects every agent whose capability set is a superset
    /// and breaks ties by ascending id.
    pub fn select(
        &self,
        agent_id: Option<&str>,
        required_capabilities: Option<&[String]>,
        _context: Option<&ExecutionContext>,
    ) -> Result<Arc<dyn Agent>, RoutingError> {
        if let Some(agent_id) = agent_id {
            return self
                .agents
                .get(agent_id)
                .cloned()
                .ok_or_else(|| RoutingError::UnknownAgent(agent_id.to_string()));
        }

        if let Some(required) = required_capabilities {
            // BTreeMap iteration is ascending by id, so the first superset
            // match is the deterministic winner.
            for agent in self.agents.values() {
                let capabilities = agent.capabilities();
                if required.iter().all(|cap| capabilities.contains(cap)) {
                    return Ok(Arc::clone(agent));
                }
            }
            return Err(RoutingError::NoCapabilityMatch(required.to_vec()));
        }

        Err(RoutingError::NoSelector)
    }

    /// All registered agent ids, ascending
    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    /// Look up an agent by id
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warden_types::{AgentInput, AgentResult, InvokeError};

    #[derive(Debug)]
    struct StubAgent {
        id: &'static str,
        capabilities: Vec<String>,
    }

    #[async_trait]
    impl Agent for StubAgent {
        fn agent_id(&self) -> &str {
            self.id
        }

        fn agent_version(&self) -> &str {
            "0.1.0"
        }

        fn capabilities(&self) -> Vec<String> {
            self.capabilities.clone()
        }

        async fn run(
            &self,
            _input: AgentInput,
            _context: &ExecutionContext,
        ) -> Result<AgentResult, InvokeError> {
            Ok(AgentResult::success(Default::default()))
        }
    }

    fn router(agents: Vec<StubAgent>) -> Router {
        Router::new(
            agents
                .into_iter()
                .map(|a| (a.id.to_string(), Arc::new(a) as Arc<dyn Agent>))
                .collect(),
        )
    }

    fn caps(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn explicit_id_is_exact_lookup_only() {
        let router = router(vec![StubAgent {
            id: "planner",
            capabilities: caps(&["plan"]),
        }]);
        assert_eq!(
            router.select(Some("planner"), None, None).unwrap().agent_id(),
            "planner"
        );
        assert!(matches!(
            router.select(Some("missing"), None, None).unwrap_err(),
            RoutingError::UnknownAgent(_)
        ));
    }

    #[test]
    fn capability_ties_break_by_ascending_id() {
        // Registered "b" before "a"; selection must still return "a".
        let router = router(vec![
            StubAgent {
                id: "b",
                capabilities: caps(&["x"]),
            },
            StubAgent {
                id: "a",
                capabilities: caps(&["x"]),
            },
        ]);
        let required = caps(&["x"]);
        for _ in 0..10 {
            let selected = router.select(None, Some(&required), None).unwrap();
            assert_eq!(selected.agent_id(), "a");
        }
    }

    #[test]
    fn capability_match_requires_a_superset() {
        let router = router(vec![
            StubAgent {
                id: "narrow",
                capabilities: caps(&["x"]),
            },
            StubAgent {
                id: "wide",
                capabilities: caps(&["x", "y", "z"]),
            },
        ]);
        let selected = router
            .select(None, Some(&caps(&["x", "y"])), None)
            .unwrap();
        assert_eq!(selected.agent_id(), "wide");

        assert!(matches!(
            router.select(None, Some(&caps(&["w"])), None).unwrap_err(),
            RoutingError::NoCapabilityMatch(_)
        ));
    }

    #[test]
    fn no_selector_is_rejected() {
        let router = router(vec![]);
        assert!(matches!(
            router.select(None, None, None).unwrap_err(),
            RoutingError::NoSelector
        ));
    }
}
