//! Startup discovery of the workload and its agent pool.

use azp_core::ports::{AgentPoolGateway, WorkloadGateway};
use azp_core::{AgentPool, Error, Result, Workload, WorkloadRef};
use tracing::debug;

/// Pod template variable naming the agent pool the agents register in.
pub const POOL_ENV_VAR: &str = "AZP_POOL";

/// What the control loop needs to start.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub workload: Workload,
    pub pool: AgentPool,
}

/// Resolve the workload and the agent pool its agents register in.
///
/// The workload lookup, the autoscaler conflict check and the pool listing
/// run concurrently. Any failure is fatal.
pub async fn discover(
    upstream: &dyn AgentPoolGateway,
    workloads: &dyn WorkloadGateway,
    target: &WorkloadRef,
) -> Result<Discovery> {
    let (workload, (), pools) = tokio::try_join!(
        workloads.get_workload(target),
        workloads.verify_no_conflicting_autoscaler(target),
        upstream.list_pools(),
    )?;

    if pools.is_empty() {
        return Err(Error::PoolNotFound("did not find any agent pools".to_string()));
    }

    let pool_name = workloads.resolve_env(&workload, POOL_ENV_VAR).await?;
    debug!(pool = %pool_name, workload = %workload.friendly_name(), "Found agent pool name");

    let pool = select_pool(pools, &pool_name).ok_or_else(|| {
        Error::PoolNotFound(format!("could not find an agent pool with name {}", pool_name))
    })?;
    debug!(pool = %pool.name, pool_id = pool.id, "Found agent pool");

    Ok(Discovery { workload, pool })
}

/// First self-hosted pool with exactly this name.
pub fn select_pool(pools: Vec<AgentPool>, name: &str) -> Option<AgentPool> {
    pools.into_iter().find(|p| !p.is_hosted && p.name == name)
}
