//! Pod records for the agent workload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Parse the phase string reported in a pod's status.
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// A member pod of the agent workload, reduced to what scaling needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub phase: PodPhase,
    /// Every container status is running and none is terminated.
    pub all_containers_running: bool,
    /// The scheduler reported it cannot place the pod.
    pub unschedulable: bool,
}

/// Name of the StatefulSet pod with the given ordinal.
pub fn ordinal_pod_name(set_name: &str, ordinal: u32) -> String {
    format!("{}-{}", set_name, ordinal)
}
