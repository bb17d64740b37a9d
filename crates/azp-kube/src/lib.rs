//! Kubernetes workload client for the agent autoscaler.

mod client;
pub mod convert;

pub use client::KubeClient;
