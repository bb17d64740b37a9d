//! Scaling configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable, process-lifetime scaling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Minimum number of free agents to keep alive.
    pub min: u32,
    /// Maximum number of agents allowed.
    pub max: u32,
    /// Time between two ticks of the control loop.
    pub poll_interval: Duration,
    pub scale_down: ScaleDownConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleDownConfig {
    /// Wait time after a scale down before scaling down again.
    pub delay: Duration,
    /// Maximum number of pods removed by one scale down.
    pub max: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 100,
            poll_interval: Duration::from_secs(10),
            scale_down: ScaleDownConfig::default(),
        }
    }
}

impl Default for ScaleDownConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(30),
            max: 1,
        }
    }
}

impl ScalingConfig {
    /// Every problem with the configuration, in a stable order.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.min < 1 {
            problems.push("Min argument cannot be less than 1.".to_string());
        }
        if self.max <= self.min {
            problems.push("Max pods argument must be greater than the minimum.".to_string());
        }
        if self.poll_interval <= Duration::from_secs(1) {
            problems.push(format!("Rate '{:?}' is too low.", self.poll_interval));
        }
        if self.scale_down.max < 1 {
            problems.push("Scale-down-max argument cannot be less than 1.".to_string());
        }
        problems
    }
}
