//! Metrics for autoscaler observability.

use crate::classifier::Classification;
use crate::engine::{Decision, HoldReason};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Counters and gauges updated by the control loop.
#[derive(Debug, Default)]
pub struct ScalerMetrics {
    /// Total scale ups.
    pub scale_ups: AtomicU64,
    /// Total scale downs.
    pub scale_downs: AtomicU64,
    /// Total scale downs prevented by the scale-down delay.
    pub scale_downs_limited: AtomicU64,
    /// Replicas added (positive) or removed (negative) by the last tick.
    pub last_scale_size: AtomicI64,
    pub total_pods: AtomicU64,
    pub active_agents: AtomicU64,
    pub pending_pods: AtomicU64,
    pub failed_pods: AtomicU64,
    pub queued_jobs: AtomicU64,
    /// Total ticks delayed by upstream rate limiting.
    pub rate_limited: AtomicU64,
}

impl ScalerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record the gauges of a classified snapshot.
    pub fn record_classification(&self, c: &Classification) {
        self.total_pods
            .store(u64::from(c.num_pods), Ordering::Relaxed);
        self.active_agents
            .store(u64::from(c.num_active_agents()), Ordering::Relaxed);
        self.pending_pods
            .store(u64::from(c.num_pending_pods), Ordering::Relaxed);
        self.failed_pods
            .store(u64::from(c.num_failed_pods), Ordering::Relaxed);
        self.queued_jobs
            .store(u64::from(c.num_queued_jobs), Ordering::Relaxed);
    }

    /// Record an applied decision.
    pub fn record_decision(&self, decision: &Decision) {
        match decision {
            Decision::Scale { from, to } if to < from => {
                self.scale_downs.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Scale { .. } => {
                self.scale_ups.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Hold {
                reason: HoldReason::ScaleDownCooldown { .. },
            } => {
                self.scale_downs_limited.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Hold { .. } => {}
        }
        self.last_scale_size
            .store(decision.delta(), Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scale_ups: self.scale_ups.load(Ordering::Relaxed),
            scale_downs: self.scale_downs.load(Ordering::Relaxed),
            scale_downs_limited: self.scale_downs_limited.load(Ordering::Relaxed),
            last_scale_size: self.last_scale_size.load(Ordering::Relaxed),
            total_pods: self.total_pods.load(Ordering::Relaxed),
            active_agents: self.active_agents.load(Ordering::Relaxed),
            pending_pods: self.pending_pods.load(Ordering::Relaxed),
            failed_pods: self.failed_pods.load(Ordering::Relaxed),
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub scale_ups: u64,
    pub scale_downs: u64,
    pub scale_downs_limited: u64,
    pub last_scale_size: i64,
    pub total_pods: u64,
    pub active_agents: u64,
    pub pending_pods: u64,
    pub failed_pods: u64,
    pub queued_jobs: u64,
    pub rate_limited: u64,
}
