//! Agent autoscaler core
//!
//! Domain types, gateway traits and error handling shared by the upstream
//! (Azure DevOps) client, the Kubernetes workload client and the scaler.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates.

pub mod agent;
pub mod config;
pub mod error;
pub mod job;
pub mod pod;
pub mod ports;
pub mod workload;

pub use agent::{Agent, AgentPool, AgentRef};
pub use config::{ScaleDownConfig, ScalingConfig};
pub use error::{Error, Result};
pub use job::{JobRequest, JobResult};
pub use pod::{PodPhase, PodRecord};
pub use workload::{EnvSource, EnvVar, Workload, WorkloadKind, WorkloadRef};
