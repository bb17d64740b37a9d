//! Job request types.

use crate::agent::AgentRef;
use serde::{Deserialize, Serialize};

/// Final result of a job request. Queued and running requests have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
    Abandoned,
    #[serde(other)]
    Unknown,
}

/// A job request in an agent pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub request_id: u64,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub matched_agents: Vec<AgentRef>,
    #[serde(default)]
    pub reserved_agent: Option<AgentRef>,
    #[serde(default)]
    pub matches_all_agents_in_pool: bool,
}

impl JobRequest {
    /// A request is queued or running while it has no result and at least
    /// one agent could pick it up.
    pub fn is_queued_or_running(&self) -> bool {
        self.result.is_none() && !self.matched_agents.is_empty()
    }

    /// No agent has claimed the request yet.
    pub fn is_unclaimed(&self) -> bool {
        self.reserved_agent.is_none()
    }

    /// Whether any of the matched agents satisfies `pred`.
    pub fn matches_agent(&self, mut pred: impl FnMut(&AgentRef) -> bool) -> bool {
        self.matched_agents.iter().any(|a| pred(a))
    }
}
