//! Warden Types - Canonical contract types for the governed control plane
//!
//! This crate contains the foundational types for warden with zero
//! dependencies on other warden crates. It defines:
//!
//! - The immutable `ExecutionContext` and its factory/propagation rules
//! - The canonical structured `Error` taxonomy every component emits
//! - The closed `Action` sum type agents use to request side effects
//! - The `Agent`, `Tool`, and `Service` capability contracts
//! - Observability signal schemas and the `ObservabilitySink` interface
//!
//! # Architectural Invariants
//!
//! 1. Contexts are immutable; propagation copies, it never mutates
//! 2. Every side effect is requested as a typed `Action`, never performed
//!    directly by an agent
//! 3. Every failure surfaces as a canonical `Error` with a fixed category,
//!    severity, and retryability
//! 4. Every observability signal carries the full correlation field set

pub mod action;
pub mod context;
pub mod contract;
pub mod error;
pub mod ids;
pub mod observability;
pub mod sink;

pub use action::*;
pub use context::*;
pub use contract::*;
pub use error::*;
pub use ids::*;
pub use observability::*;
pub use sink::*;

/// Version of the warden contract schema
pub const CONTRACT_VERSION: &str = "0.1.0";
