//! Mock gateways and fixtures shared by the scaler tests.

use crate::classifier::Classification;
use async_trait::async_trait;
use azp_core::agent::HOSTNAME_CAPABILITY;
use azp_core::ports::{AgentPoolGateway, WorkloadGateway};
use azp_core::{
    Agent, AgentPool, AgentRef, EnvSource, EnvVar, Error, JobRequest, PodPhase, PodRecord, Result,
    Workload, WorkloadKind, WorkloadRef,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

pub const SET_NAME: &str = "azp-agent";

pub fn workload(replicas: u32) -> Workload {
    Workload {
        kind: WorkloadKind::StatefulSet,
        namespace: "ci".to_string(),
        name: SET_NAME.to_string(),
        replicas,
        selector: "app=azp-agent".to_string(),
        env: vec![EnvVar {
            name: "AZP_POOL".to_string(),
            source: EnvSource::Value("k8s-linux".to_string()),
        }],
    }
}

pub fn agent(id: u64, name: &str, status: &str, assigned: Option<u64>) -> Agent {
    Agent {
        id,
        name: name.to_string(),
        enabled: true,
        status: status.to_string(),
        system_capabilities: HashMap::from([(HOSTNAME_CAPABILITY.to_string(), name.to_string())]),
        assigned_request: assigned.map(|request_id| JobRequest {
            request_id,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn job(request_id: u64, matched_agents: Vec<AgentRef>) -> JobRequest {
    JobRequest {
        request_id,
        matched_agents,
        ..Default::default()
    }
}

pub fn pod(name: &str) -> PodRecord {
    pod_with(name, PodPhase::Running, true, false)
}

pub fn pod_with(
    name: &str,
    phase: PodPhase,
    all_containers_running: bool,
    unschedulable: bool,
) -> PodRecord {
    PodRecord {
        name: name.to_string(),
        phase,
        all_containers_running,
        unschedulable,
    }
}

/// All pods running, with active agents on the given ordinals.
pub fn classification(num_pods: u32, active_ordinals: &[u32], queued: u32) -> Classification {
    Classification {
        pod_names: (0..num_pods).map(|i| format!("{}-{}", SET_NAME, i)).collect(),
        num_pods,
        num_running_pods: num_pods,
        num_pending_pods: 0,
        num_unschedulable_pods: 0,
        num_failed_pods: 0,
        active_agent_names: active_ordinals
            .iter()
            .map(|i| format!("agent-{}", i))
            .collect(),
        active_agent_pod_names: active_ordinals
            .iter()
            .map(|i| format!("{}-{}", SET_NAME, i))
            .collect(),
        num_queued_jobs: queued,
    }
}

#[derive(Default)]
pub struct MockUpstream {
    pools: Mutex<Vec<AgentPool>>,
    agents: Mutex<Vec<Agent>>,
    jobs: Mutex<Vec<JobRequest>>,
    job_errors: Mutex<VecDeque<Error>>,
    job_calls: Mutex<Vec<Instant>>,
}

impl MockUpstream {
    pub fn set_pools(&self, pools: Vec<AgentPool>) {
        *self.pools.lock().unwrap() = pools;
    }

    pub fn set_agents(&self, agents: Vec<Agent>) {
        *self.agents.lock().unwrap() = agents;
    }

    pub fn set_jobs(&self, jobs: Vec<JobRequest>) {
        *self.jobs.lock().unwrap() = jobs;
    }

    /// Fail the next job request listing with `err`.
    pub fn fail_jobs_with(&self, err: Error) {
        self.job_errors.lock().unwrap().push_back(err);
    }

    /// Times at which job requests were listed.
    pub fn job_calls(&self) -> Vec<Instant> {
        self.job_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentPoolGateway for MockUpstream {
    async fn list_pools(&self) -> Result<Vec<AgentPool>> {
        Ok(self.pools.lock().unwrap().clone())
    }

    async fn list_pool_agents(&self, _pool_id: u64) -> Result<Vec<Agent>> {
        Ok(self.agents.lock().unwrap().clone())
    }

    async fn list_job_requests(&self, _pool_id: u64) -> Result<Vec<JobRequest>> {
        self.job_calls.lock().unwrap().push(Instant::now());
        if let Some(err) = self.job_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.jobs.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct MockWorkloads {
    workload: Mutex<Option<Workload>>,
    pods: Mutex<Vec<PodRecord>>,
    conflicting: Mutex<bool>,
    env: Mutex<HashMap<String, String>>,
    scales: Mutex<Vec<u32>>,
    scale_errors: Mutex<VecDeque<Error>>,
}

impl MockWorkloads {
    pub fn set_workload(&self, workload: Workload) {
        *self.workload.lock().unwrap() = Some(workload);
    }

    pub fn set_pods(&self, pods: Vec<PodRecord>) {
        *self.pods.lock().unwrap() = pods;
    }

    pub fn set_conflicting(&self, conflicting: bool) {
        *self.conflicting.lock().unwrap() = conflicting;
    }

    pub fn set_env(&self, name: &str, value: &str) {
        self.env
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn fail_scale_with(&self, err: Error) {
        self.scale_errors.lock().unwrap().push_back(err);
    }

    /// Replica counts written so far.
    pub fn scales(&self) -> Vec<u32> {
        self.scales.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkloadGateway for MockWorkloads {
    async fn get_workload(&self, workload: &WorkloadRef) -> Result<Workload> {
        self.workload
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::WorkloadNotFound(workload.friendly_name()))
    }

    async fn verify_no_conflicting_autoscaler(&self, workload: &WorkloadRef) -> Result<()> {
        if *self.conflicting.lock().unwrap() {
            return Err(Error::ConflictingAutoscaler(workload.friendly_name()));
        }
        Ok(())
    }

    async fn list_pods(&self, _workload: &Workload) -> Result<Vec<PodRecord>> {
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn scale(&self, _workload: &Workload, replicas: u32) -> Result<()> {
        if let Some(err) = self.scale_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.scales.lock().unwrap().push(replicas);

        let mut pods = self.pods.lock().unwrap();
        let current = pods.len() as u32;
        if replicas < current {
            pods.truncate(replicas as usize);
        } else {
            for ordinal in current..replicas {
                pods.push(pod(&format!("{}-{}", SET_NAME, ordinal)));
            }
        }
        Ok(())
    }

    async fn resolve_env(&self, workload: &Workload, name: &str) -> Result<String> {
        self.env.lock().unwrap().get(name).cloned().ok_or_else(|| {
            Error::EnvVar(format!(
                "Could not find environment variable {} in {}",
                name,
                workload.friendly_name()
            ))
        })
    }
}
