//! Agent and agent pool types.

use crate::job::JobRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// System capability the agent container reports its pod name under.
pub const HOSTNAME_CAPABILITY: &str = "HOSTNAME";

/// A registered build agent, as returned when listing a pool's agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub system_capabilities: HashMap<String, String>,
    #[serde(default)]
    pub assigned_request: Option<JobRequest>,
    #[serde(default)]
    pub last_completed_request: Option<JobRequest>,
}

impl Agent {
    /// Agents report their status as `online` or `offline`, in any case.
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }

    /// The pod name this agent runs in, if it reported one.
    pub fn hostname(&self) -> Option<&str> {
        self.system_capabilities
            .get(HOSTNAME_CAPABILITY)
            .map(String::as_str)
    }

    pub fn has_assigned_request(&self) -> bool {
        self.assigned_request.is_some()
    }
}

/// The abbreviated agent embedded in job requests (matched/reserved agents).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRef {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// An agent pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPool {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_hosted: bool,
    #[serde(default)]
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_agent_details() {
        let json = r#"{
            "id": 8,
            "name": "azp-agent-0",
            "version": "2.150.3",
            "enabled": true,
            "status": "Online",
            "provisioningState": "Provisioned",
            "systemCapabilities": {"HOSTNAME": "azp-agent-0", "Agent.OS": "Linux"},
            "assignedRequest": {"requestId": 42, "matchesAllAgentsInPool": true}
        }"#;

        let agent: Agent = serde_json::from_str(json).unwrap();
        assert_eq!(agent.id, 8);
        assert!(agent.is_online());
        assert_eq!(agent.hostname(), Some("azp-agent-0"));
        assert!(agent.has_assigned_request());
        assert!(agent.last_completed_request.is_none());
    }

    #[test]
    fn test_agent_without_capabilities() {
        let agent: Agent =
            serde_json::from_str(r#"{"id": 1, "name": "a", "status": "offline"}"#).unwrap();
        assert!(!agent.is_online());
        assert_eq!(agent.hostname(), None);
        assert!(!agent.has_assigned_request());
    }
}
