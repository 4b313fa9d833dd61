//! Per-run lifecycle state machine
//!
//! Tracks one run's progress for observability and safe termination. The
//! transition table is closed; anything outside it is rejected. The
//! manager keeps an ordered event log and emits no observability signals
//! of its own; callers do.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use warden_types::ExecutionContext;

/// Lifecycle state of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Initializing,
    Ready,
    Executing,
    Completed,
    Failed,
    Terminated,
}

/// Observable lifecycle event appended per successful transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    InitializationStarted,
    InitializationCompleted,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    TerminationStarted,
    TerminationCompleted,
}

/// Rejected lifecycle transition
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// Manages one run's lifecycle
///
/// Created in `Initializing` at run start and discarded with the run.
/// Terminal states (`Completed`, `Failed`, `Terminated`) are not
/// re-enterable.
pub struct LifecycleManager {
    run_id: String,
    state: LifecycleState,
    events: Vec<(LifecycleEvent, Map<String, Value>)>,
}

impl LifecycleManager {
    pub fn new(context: &ExecutionContext) -> Self {
        Self {
            run_id: context.run_id().to_string(),
            state: LifecycleState::Initializing,
            events: Vec::new(),
        }
    }

    /// Transition to a new state, appending the mapped event on success
    pub fn transition(
        &mut self,
        target: LifecycleState,
        metadata: Map<String, Value>,
    ) -> Result<(), LifecycleError> {
        if !Self::allowed_targets(self.state).contains(&target) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }

        if let Some(event) = Self::event_for(target) {
            self.events.push((event, metadata));
        }
        tracing::debug!(run_id = %self.run_id, from = ?self.state, to = ?target, "lifecycle transition");
        self.state = target;
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Ordered event log recorded so far
    pub fn events(&self) -> &[(LifecycleEvent, Map<String, Value>)] {
        &self.events
    }

    /// True only for `Completed`, `Failed`, and `Terminated`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::Completed | LifecycleState::Failed | LifecycleState::Terminated
        )
    }

    fn allowed_targets(from: LifecycleState) -> &'static [LifecycleState] {
        match from {
            LifecycleState::Initializing => &[LifecycleState::Ready, LifecycleState::Failed],
            LifecycleState::Ready => &[LifecycleState::Executing, LifecycleState::Terminated],
            LifecycleState::Executing => &[
                LifecycleState::Completed,
                LifecycleState::Failed,
                LifecycleState::Terminated,
            ],
            LifecycleState::Completed => &[],
            LifecycleState::Failed => &[LifecycleState::Terminated],
            LifecycleState::Terminated => &[],
        }
    }

    fn event_for(target: LifecycleState) -> Option<LifecycleEvent> {
        match target {
            LifecycleState::Initializing => None,
            LifecycleState::Ready => Some(LifecycleEvent::InitializationCompleted),
            LifecycleState::Executing => Some(LifecycleEvent::ExecutionStarted),
            LifecycleState::Completed => Some(LifecycleEvent::ExecutionCompleted),
            LifecycleState::Failed => Some(LifecycleEvent::ExecutionFailed),
            LifecycleState::Terminated => Some(LifecycleEvent::TerminationStarted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_types::ContextOptions;

    fn manager() -> LifecycleManager {
        let context = ExecutionContext::create("system:runtime", ContextOptions::default());
        LifecycleManager::new(&context)
    }

    #[test]
    fn happy_path_records_ordered_events() {
        let mut lifecycle = manager();
        lifecycle.transition(LifecycleState::Ready, Map::new()).unwrap();
        lifecycle.transition(LifecycleState::Executing, Map::new()).unwrap();
        lifecycle.transition(LifecycleState::Completed, Map::new()).unwrap();

        let events: Vec<LifecycleEvent> = lifecycle.events().iter().map(|(e, _)| *e).collect();
        assert_eq!(
            events,
            vec![
                LifecycleEvent::InitializationCompleted,
                LifecycleEvent::ExecutionStarted,
                LifecycleEvent::ExecutionCompleted,
            ]
        );
        assert!(lifecycle.is_terminal());
    }

    #[test]
    fn rejects_transitions_outside_the_table() {
        let mut lifecycle = manager();
        // Initializing cannot jump straight to Executing.
        let err = lifecycle
            .transition(LifecycleState::Executing, Map::new())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert_eq!(lifecycle.state(), LifecycleState::Initializing);
    }

    #[test]
    fn terminal_states_are_not_reenterable() {
        let mut lifecycle = manager();
        lifecycle.transition(LifecycleState::Ready, Map::new()).unwrap();
        lifecycle.transition(LifecycleState::Executing, Map::new()).unwrap();
        lifecycle.transition(LifecycleState::Completed, Map::new()).unwrap();

        for target in [
            LifecycleState::Ready,
            LifecycleState::Executing,
            LifecycleState::Completed,
            LifecycleState::Failed,
            LifecycleState::Terminated,
        ] {
            assert!(lifecycle.transition(target, Map::new()).is_err());
        }
    }

    #[test]
    fn failed_may_only_terminate() {
        let mut lifecycle = manager();
        lifecycle.transition(LifecycleState::Ready, Map::new()).unwrap();
        lifecycle.transition(LifecycleState::Executing, Map::new()).unwrap();

        let mut meta = Map::new();
        meta.insert("error".to_string(), json!("agent exploded"));
        lifecycle.transition(LifecycleState::Failed, meta.clone()).unwrap();
        assert!(lifecycle.is_terminal());

        assert!(lifecycle.transition(LifecycleState::Executing, Map::new()).is_err());
        lifecycle.transition(LifecycleState::Terminated, Map::new()).unwrap();

        let (event, metadata) = &lifecycle.events()[2];
        assert_eq!(*event, LifecycleEvent::ExecutionFailed);
        assert_eq!(metadata["error"], json!("agent exploded"));
    }

    #[test]
    fn is_terminal_is_false_for_live_states() {
        let mut lifecycle = manager();
        assert!(!lifecycle.is_terminal());
        lifecycle.transition(LifecycleState::Ready, Map::new()).unwrap();
        assert!(!lifecycle.is_terminal());
        lifecycle.transition(LifecycleState::Executing, Map::new()).unwrap();
        assert!(!lifecycle.is_terminal());
    }
}
