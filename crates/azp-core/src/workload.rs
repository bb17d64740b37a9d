//! Workload types.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of scalable resource running the agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadKind {
    StatefulSet,
}

impl WorkloadKind {
    /// Kubernetes API kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }

    /// Whether pods have stable `<name>-<ordinal>` names and scale-down
    /// always removes the highest ordinals first.
    pub fn has_ordinal_pods(&self) -> bool {
        matches!(self, WorkloadKind::StatefulSet)
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("StatefulSet") {
            Ok(WorkloadKind::StatefulSet)
        } else {
            Err(Error::UnsupportedKind(s.to_string()))
        }
    }
}

/// Identifies the workload to scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(kind: WorkloadKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The name used to reference the resource in kubectl, ex: statefulset/azp-agent
    pub fn friendly_name(&self) -> String {
        format!("{}/{}", self.kind.as_str().to_lowercase(), self.name)
    }
}

/// Where an environment variable of the pod template gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    Value(String),
    ConfigMapKey { name: String, key: String },
    SecretKey { name: String, key: String },
    /// fieldRef, resourceFieldRef or an empty definition.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub source: EnvSource,
}

/// Descriptor of the scalable resource, fetched once at startup.
#[derive(Debug, Clone)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
    /// Spec replicas at the time the descriptor was read.
    pub replicas: u32,
    /// Pod label selector in `kubectl` syntax.
    pub selector: String,
    /// Environment of the pod template containers, in declaration order.
    pub env: Vec<EnvVar>,
}

impl Workload {
    pub fn reference(&self) -> WorkloadRef {
        WorkloadRef::new(self.kind, self.namespace.clone(), self.name.clone())
    }

    pub fn friendly_name(&self) -> String {
        self.reference().friendly_name()
    }

    /// First environment variable with the given name across all containers.
    pub fn env_var(&self, name: &str) -> Option<&EnvVar> {
        self.env.iter().find(|e| e.name == name)
    }
}
