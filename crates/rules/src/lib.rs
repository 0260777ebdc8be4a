//! Transaction risk decision engine.
//!
//! This crate provides:
//! - YAML rule chain with typed per-type conditions and hot reload
//! - Evaluators for limit, frequency, blacklist, batch and scheduled rules
//! - Chain evaluation with contextual risk scoring
//! - Context aggregation over an analytical store, failing open to zero values
//! - A bounded in-process realtime metrics window
//! - [`RiskService`], the `check_risk` orchestrator

pub mod aggregator;
pub mod chain;
pub mod context;
pub mod evaluator;
pub mod loader;
pub mod metrics;
pub mod schema;
pub mod scoring;
pub mod service;

pub use service::{RealtimeMonitor, RiskService};
