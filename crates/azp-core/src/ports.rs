//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the scaler and the external
//! adapters: the Azure DevOps agent pool API and the Kubernetes workload.

use crate::Result;
use crate::agent::{Agent, AgentPool};
use crate::job::JobRequest;
use crate::pod::PodRecord;
use crate::workload::{Workload, WorkloadRef};
use async_trait::async_trait;

/// Read access to the agent pools of the build-queue service.
///
/// Implementations never retry. A throttled call surfaces as
/// [`crate::Error::RateLimited`] and the caller decides how long to wait.
#[async_trait]
pub trait AgentPoolGateway: Send + Sync {
    /// List all agent pools.
    async fn list_pools(&self) -> Result<Vec<AgentPool>>;

    /// List the agents of a pool, with capabilities and assigned requests.
    async fn list_pool_agents(&self, pool_id: u64) -> Result<Vec<Agent>>;

    /// List the job requests of a pool.
    async fn list_job_requests(&self, pool_id: u64) -> Result<Vec<JobRequest>>;
}

/// Access to the scalable resource running the agents.
#[async_trait]
pub trait WorkloadGateway: Send + Sync {
    /// Fetch the workload descriptor.
    async fn get_workload(&self, workload: &WorkloadRef) -> Result<Workload>;

    /// Fail if a HorizontalPodAutoscaler already drives the workload.
    async fn verify_no_conflicting_autoscaler(&self, workload: &WorkloadRef) -> Result<()>;

    /// List the pods selected by the workload.
    async fn list_pods(&self, workload: &Workload) -> Result<Vec<PodRecord>>;

    /// Set the replica count. A write matching the current count is skipped.
    async fn scale(&self, workload: &Workload, replicas: u32) -> Result<()>;

    /// Resolve an environment variable of the workload's pod template.
    async fn resolve_env(&self, workload: &Workload, name: &str) -> Result<String>;
}
