//! Scaling decisions.
//!
//! [`DecisionEngine::evaluate`] is a pure function of the classification,
//! the workload, the scale-down history and the current time. The control
//! loop applies its result and records scale-downs in [`ControllerState`].

use crate::classifier::Classification;
use azp_core::pod::ordinal_pod_name;
use azp_core::{ScalingConfig, Workload};
use chrono::{DateTime, Utc};
use std::fmt;

/// State carried between ticks. Lost on restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    /// Time of the last successful scale-down.
    pub last_scale_down: Option<DateTime<Utc>>,
}

impl ControllerState {
    /// Earliest time the next scale-down may happen.
    ///
    /// A delay past the calendar range postpones scale-downs forever.
    pub fn next_scale_down(&self, config: &ScalingConfig) -> Option<DateTime<Utc>> {
        let delay = chrono::Duration::from_std(config.scale_down.delay).ok();
        self.last_scale_down.map(|at| {
            delay
                .and_then(|delay| at.checked_add_signed(delay))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }
}

/// Why a tick issues no scale write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Pods are starting or broken and the cluster is not simply full.
    PodsNotReady { pending: u32, failed: u32 },
    /// More pods are wanted but existing ones cannot be placed.
    UnschedulablePods { unschedulable: u32 },
    /// An agent on the highest ordinal pod is running a job.
    ActivePodAtHighestOrdinal { ordinal: u32 },
    /// A scale-down happened less than the configured delay ago.
    ScaleDownCooldown { target: u32, until: DateTime<Utc> },
    /// The pod count already matches demand.
    Balanced,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::PodsNotReady { pending, failed } => write!(
                f,
                "there are {} pending pods and {} failed pods",
                pending, failed
            ),
            HoldReason::UnschedulablePods { unschedulable } => {
                write!(f, "there are {} unschedulable pods", unschedulable)
            }
            HoldReason::ActivePodAtHighestOrdinal { ordinal } => {
                write!(f, "the agent on ordinal {} is active", ordinal)
            }
            HoldReason::ScaleDownCooldown { target, until } => write!(
                f,
                "cannot scale down to {} pods until {}",
                target,
                until.to_rfc3339()
            ),
            HoldReason::Balanced => f.write_str("pod count matches demand"),
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Scale { from: u32, to: u32 },
    Hold { reason: HoldReason },
}

impl Decision {
    fn hold(reason: HoldReason) -> Self {
        Decision::Hold { reason }
    }

    pub fn is_scale_down(&self) -> bool {
        matches!(self, Decision::Scale { from, to } if to < from)
    }

    /// Signed change in replicas, zero for holds.
    pub fn delta(&self) -> i64 {
        match self {
            Decision::Scale { from, to } => i64::from(*to) - i64::from(*from),
            Decision::Hold { .. } => 0,
        }
    }
}

/// Computes target replica counts.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: ScalingConfig,
}

impl DecisionEngine {
    pub fn new(config: ScalingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Decide the replica count for this tick.
    pub fn evaluate(
        &self,
        c: &Classification,
        workload: &Workload,
        state: &ControllerState,
        now: DateTime<Utc>,
    ) -> Decision {
        let num_pods = i64::from(c.num_pods);
        let active = i64::from(c.num_active_agents());
        let queued = i64::from(c.num_queued_jobs);
        let min = i64::from(self.config.min);
        let max = i64::from(self.config.max);
        let scale_down_max = i64::from(self.config.scale_down.max);

        // A full cluster may still scale down.
        if !c.all_pods_running()
            && !(c.num_unschedulable_pods == c.num_pending_pods && c.num_failed_pods == 0)
        {
            return Decision::hold(HoldReason::PodsNotReady {
                pending: c.num_pending_pods,
                failed: c.num_failed_pods,
            });
        }

        let wanted = active + queued + min;
        let mut scale = wanted - num_pods;

        if scale > 0 && c.num_unschedulable_pods > 0 {
            return Decision::hold(HoldReason::UnschedulablePods {
                unschedulable: c.num_unschedulable_pods,
            });
        }

        // Ordinal pods are removed highest first.
        if scale < 0 && active > 0 && workload.kind.has_ordinal_pods() {
            if let Some(ordinal) = highest_active_ordinal(c, workload) {
                scale = scale.max(-(num_pods - 1 - i64::from(ordinal)));
                if scale == 0 {
                    return Decision::hold(HoldReason::ActivePodAtHighestOrdinal { ordinal });
                }
            }
        }

        let mut target = if scale > 0 {
            active.max(max.min(num_pods + scale))
        } else if scale < 0 {
            active.max(max.min(min.max(num_pods + scale)))
        } else if num_pods > max {
            if active > max {
                active
            } else {
                max.max(num_pods - scale_down_max)
            }
        } else {
            return Decision::hold(HoldReason::Balanced);
        };

        if target < num_pods {
            if let Some(until) = state.next_scale_down(&self.config) {
                if now < until {
                    return Decision::hold(HoldReason::ScaleDownCooldown {
                        target: clamp_u32(target),
                        until,
                    });
                }
            }
            target = target.max(num_pods - scale_down_max);
        }

        if target == num_pods {
            return Decision::hold(HoldReason::Balanced);
        }

        Decision::Scale {
            from: c.num_pods,
            to: clamp_u32(target),
        }
    }
}

/// Highest ordinal whose pod runs an active agent.
fn highest_active_ordinal(c: &Classification, workload: &Workload) -> Option<u32> {
    (0..c.num_pods).rev().find(|ordinal| {
        c.active_agent_pod_names
            .contains(&ordinal_pod_name(&workload.name, *ordinal))
    })
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}
