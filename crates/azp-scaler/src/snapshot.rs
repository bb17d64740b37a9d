//! Concurrent acquisition of one tick's view of the world.

use azp_core::ports::{AgentPoolGateway, WorkloadGateway};
use azp_core::{Agent, JobRequest, PodRecord, Result, Workload};
use std::sync::Arc;
use tracing::trace;

/// Agents, job requests and pods read during the same tick.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub agents: Vec<Agent>,
    pub jobs: Vec<JobRequest>,
    pub pods: Vec<PodRecord>,
}

/// Reads the three views of a tick concurrently.
pub struct SnapshotFetcher {
    upstream: Arc<dyn AgentPoolGateway>,
    workloads: Arc<dyn WorkloadGateway>,
}

impl SnapshotFetcher {
    pub fn new(upstream: Arc<dyn AgentPoolGateway>, workloads: Arc<dyn WorkloadGateway>) -> Self {
        Self {
            upstream,
            workloads,
        }
    }

    /// Fetch a complete snapshot. The first failing read aborts the others.
    pub async fn fetch(&self, pool_id: u64, workload: &Workload) -> Result<Snapshot> {
        let (agents, jobs, pods) = tokio::try_join!(
            self.upstream.list_pool_agents(pool_id),
            self.upstream.list_job_requests(pool_id),
            self.workloads.list_pods(workload),
        )?;

        trace!(
            agents = agents.len(),
            jobs = jobs.len(),
            pods = pods.len(),
            "Fetched snapshot"
        );

        Ok(Snapshot { agents, jobs, pods })
    }
}
