//! Reduction of a snapshot to the counts and sets the engine decides on.

use crate::snapshot::Snapshot;
use azp_core::{Agent, JobRequest, PodPhase};
use std::collections::HashSet;

/// Counts and sets derived from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub pod_names: HashSet<String>,
    pub num_pods: u32,
    /// Running with every container up.
    pub num_running_pods: u32,
    /// Pending, or running with a container down.
    pub num_pending_pods: u32,
    /// Pending pods the scheduler could not place.
    pub num_unschedulable_pods: u32,
    pub num_failed_pods: u32,
    /// Online agents on a known pod that hold an assigned request.
    pub active_agent_names: HashSet<String>,
    /// Pod names of the active agents.
    pub active_agent_pod_names: HashSet<String>,
    /// Unclaimed open requests an active agent (or any agent) could take.
    pub num_queued_jobs: u32,
}

impl Classification {
    pub fn num_active_agents(&self) -> u32 {
        self.active_agent_names.len() as u32
    }

    pub fn all_pods_running(&self) -> bool {
        self.num_running_pods == self.num_pods
    }
}

/// Classify a snapshot.
pub fn classify(snapshot: &Snapshot) -> Classification {
    let mut c = Classification {
        num_pods: snapshot.pods.len() as u32,
        ..Default::default()
    };

    for pod in &snapshot.pods {
        c.pod_names.insert(pod.name.clone());
        match pod.phase {
            PodPhase::Running if pod.all_containers_running => c.num_running_pods += 1,
            PodPhase::Running => c.num_pending_pods += 1,
            PodPhase::Pending => {
                c.num_pending_pods += 1;
                if pod.unschedulable {
                    c.num_unschedulable_pods += 1;
                }
            }
            _ => {}
        }
    }
    c.num_failed_pods = c.num_pods - c.num_running_pods - c.num_pending_pods;

    for agent in &snapshot.agents {
        if let Some(pod_name) = active_pod_name(agent, &c.pod_names) {
            c.active_agent_names.insert(agent.name.clone());
            c.active_agent_pod_names.insert(pod_name.to_string());
        }
    }

    c.num_queued_jobs = snapshot
        .jobs
        .iter()
        .filter(|job| is_queued(job, &c.active_agent_names))
        .count() as u32;

    c
}

fn active_pod_name<'a>(agent: &'a Agent, pod_names: &HashSet<String>) -> Option<&'a str> {
    if !agent.is_online() || !agent.has_assigned_request() {
        return None;
    }
    agent.hostname().filter(|host| pod_names.contains(*host))
}

fn is_queued(job: &JobRequest, active_agent_names: &HashSet<String>) -> bool {
    job.is_queued_or_running()
        && job.is_unclaimed()
        && (job.matches_all_agents_in_pool
            || job.matches_agent(|a| active_agent_names.contains(&a.name)))
}
