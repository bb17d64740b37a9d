//! Scaling for the agent autoscaler.
//!
//! Each tick the [`controller::ControlLoop`] fetches a [`snapshot::Snapshot`]
//! of agents, job requests and pods, reduces it with the classifier and asks
//! the [`engine::DecisionEngine`] for a target replica count.

pub mod classifier;
pub mod controller;
pub mod engine;
pub mod metrics;
pub mod snapshot;
pub mod startup;

#[cfg(test)]
mod testing;

pub use classifier::{Classification, classify};
pub use controller::ControlLoop;
pub use engine::{ControllerState, Decision, DecisionEngine, HoldReason};
pub use metrics::{MetricsSnapshot, ScalerMetrics};
pub use snapshot::{Snapshot, SnapshotFetcher};
pub use startup::{POOL_ENV_VAR, Discovery, discover};
