//! Budget tracking and enforcement
//!
//! One tracker per run, shared by every action of that run. Enforcement
//! evaluates time, then calls, then cost; the first crossed limit decides
//! which exhaustion is reported, so audit trails are reproducible when
//! several budgets are exhausted at once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use warden_types::BudgetLimits;

/// Budget dimension, in enforcement order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetDimension {
    Time,
    Calls,
    Cost,
}

impl fmt::Display for BudgetDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time => write!(f, "time"),
            Self::Calls => write!(f, "calls"),
            Self::Cost => write!(f, "cost"),
        }
    }
}

/// Budget accounting or enforcement failure
#[derive(Debug, Clone, Error)]
pub enum BudgetError {
    /// A limit was crossed; `consumed >= limit`, inclusive
    #[error("{dimension} budget exhausted: consumed {consumed} >= limit {limit}")]
    Exhausted {
        dimension: BudgetDimension,
        limit: f64,
        consumed: f64,
    },
    /// Cost accounting rejects negative amounts
    #[error("cost cannot be negative: {0}")]
    NegativeCost(f64),
}

/// Point-in-time snapshot of budget consumption
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub time_limit_seconds: Option<f64>,
    pub time_consumed_seconds: f64,
    pub call_limit: Option<u64>,
    pub call_count: u64,
    pub cost_limit: Option<f64>,
    pub cost_accumulated: f64,
}

/// Tracks budget consumption for one run
///
/// Owned by exactly one run and shared across that run's actions via
/// `Arc`. Counters are monotonic: calls only increment, cost only grows.
pub struct BudgetTracker {
    limits: BudgetLimits,
    start: Instant,
    call_count: AtomicU64,
    cost_accumulated: Mutex<f64>,
}

impl BudgetTracker {
    pub fn new(limits: BudgetLimits) -> Self {
        tracing::debug!(
            time_limit = ?limits.time_limit_seconds,
            call_limit = ?limits.call_limit,
            cost_limit = ?limits.cost_limit,
            "budget tracker initialized"
        );
        Self {
            limits,
            start: Instant::now(),
            call_count: AtomicU64::new(0),
            cost_accumulated: Mutex::new(0.0),
        }
    }

    /// The declared limits this tracker enforces against
    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    /// Record one governed call
    pub fn record_call(&self) {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(call_count = count, call_limit = ?self.limits.call_limit, "call recorded");
    }

    /// Record cost consumption; negative cost fails fast
    pub fn record_cost(&self, cost: f64) -> Result<(), BudgetError> {
        if cost < 0.0 {
            return Err(BudgetError::NegativeCost(cost));
        }
        let mut accumulated = self.cost_accumulated.lock();
        *accumulated += cost;
        tracing::debug!(cost, cost_accumulated = *accumulated, cost_limit = ?self.limits.cost_limit, "cost recorded");
        Ok(())
    }

    /// Seconds elapsed since tracker construction
    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Number of calls recorded so far
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Total cost accumulated so far
    pub fn cost_accumulated(&self) -> f64 {
        *self.cost_accumulated.lock()
    }

    /// Snapshot of limits and consumption
    pub fn status(&self) -> BudgetStatus {
        BudgetStatus {
            time_limit_seconds: self.limits.time_limit_seconds,
            time_consumed_seconds: self.elapsed_seconds(),
            call_limit: self.limits.call_limit,
            call_count: self.call_count(),
            cost_limit: self.limits.cost_limit,
            cost_accumulated: self.cost_accumulated(),
        }
    }
}

/// Enforces budget limits against a tracker
///
/// Evaluation order is fixed: time, then calls, then cost. The first
/// crossed limit is reported; later dimensions are not consulted.
#[derive(Clone)]
pub struct BudgetEnforcer {
    tracker: Arc<BudgetTracker>,
}

impl BudgetEnforcer {
    pub fn new(tracker: Arc<BudgetTracker>) -> Self {
        Self { tracker }
    }

    /// The tracker this enforcer consults
    pub fn tracker(&self) -> &Arc<BudgetTracker> {
        &self.tracker
    }

    /// Fail on the first exhausted dimension, if any
    pub fn check(&self) -> Result<(), BudgetError> {
        let limits = self.tracker.limits();

        if let Some(limit) = limits.time_limit_seconds {
            let consumed = self.tracker.elapsed_seconds();
            if consumed >= limit {
                return Err(self.exhausted(BudgetDimension::Time, limit, consumed));
            }
        }

        if let Some(limit) = limits.call_limit {
            let consumed = self.tracker.call_count();
            if consumed >= limit {
                return Err(self.exhausted(BudgetDimension::Calls, limit as f64, consumed as f64));
            }
        }

        if let Some(limit) = limits.cost_limit {
            let consumed = self.tracker.cost_accumulated();
            if consumed >= limit {
                return Err(self.exhausted(BudgetDimension::Cost, limit, consumed));
            }
        }

        tracing::debug!(call_count = self.tracker.call_count(), "budget check passed");
        Ok(())
    }

    fn exhausted(&self, dimension: BudgetDimension, limit: f64, consumed: f64) -> BudgetError {
        tracing::warn!(%dimension, limit, consumed, "budget exhausted");
        BudgetError::Exhausted {
            dimension,
            limit,
            consumed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(limits: BudgetLimits) -> Arc<BudgetTracker> {
        Arc::new(BudgetTracker::new(limits))
    }

    #[test]
    fn unbounded_budget_never_fails() {
        let enforcer = BudgetEnforcer::new(tracker(BudgetLimits::unbounded()));
        for _ in 0..100 {
            enforcer.tracker().record_call();
        }
        enforcer.tracker().record_cost(1e9).unwrap();
        assert!(enforcer.check().is_ok());
    }

    #[test]
    fn call_limit_is_inclusive() {
        let enforcer = BudgetEnforcer::new(tracker(BudgetLimits {
            call_limit: Some(2),
            ..BudgetLimits::unbounded()
        }));
        enforcer.tracker().record_call();
        assert!(enforcer.check().is_ok());
        enforcer.tracker().record_call();
        let err = enforcer.check().unwrap_err();
        assert!(matches!(
            err,
            BudgetError::Exhausted {
                dimension: BudgetDimension::Calls,
                ..
            }
        ));
    }

    #[test]
    fn time_is_checked_before_calls() {
        // Both dimensions exhausted at once: time must be the one reported.
        let enforcer = BudgetEnforcer::new(tracker(BudgetLimits {
            time_limit_seconds: Some(0.0),
            call_limit: Some(1),
            ..BudgetLimits::unbounded()
        }));
        enforcer.tracker().record_call();
        let err = enforcer.check().unwrap_err();
        assert!(matches!(
            err,
            BudgetError::Exhausted {
                dimension: BudgetDimension::Time,
                ..
            }
        ));
    }

    #[test]
    fn calls_are_checked_before_cost() {
        let enforcer = BudgetEnforcer::new(tracker(BudgetLimits {
            call_limit: Some(1),
            cost_limit: Some(1.0),
            ..BudgetLimits::unbounded()
        }));
        enforcer.tracker().record_call();
        enforcer.tracker().record_cost(2.0).unwrap();
        let err = enforcer.check().unwrap_err();
        assert!(matches!(
            err,
            BudgetError::Exhausted {
                dimension: BudgetDimension::Calls,
                ..
            }
        ));
    }

    #[test]
    fn cost_exhaustion_carries_limit_and_consumed() {
        let enforcer = BudgetEnforcer::new(tracker(BudgetLimits {
            cost_limit: Some(1.5),
            ..BudgetLimits::unbounded()
        }));
        enforcer.tracker().record_cost(2.5).unwrap();
        match enforcer.check().unwrap_err() {
            BudgetError::Exhausted {
                dimension: BudgetDimension::Cost,
                limit,
                consumed,
            } => {
                assert_eq!(limit, 1.5);
                assert_eq!(consumed, 2.5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn negative_cost_is_rejected() {
        let tracker = tracker(BudgetLimits::unbounded());
        let err = tracker.record_cost(-0.5).unwrap_err();
        assert!(matches!(err, BudgetError::NegativeCost(_)));
        assert_eq!(tracker.cost_accumulated(), 0.0);
    }

    #[test]
    fn counters_accumulate_across_shared_handles() {
        let shared = tracker(BudgetLimits::unbounded());
        let other = Arc::clone(&shared);
        shared.record_call();
        other.record_call();
        other.record_cost(0.25).unwrap();
        assert_eq!(shared.call_count(), 2);
        assert_eq!(shared.cost_accumulated(), 0.25);
    }
}
