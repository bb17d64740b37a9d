//! The control loop: fetch, classify, decide, apply, sleep.

use crate::classifier::classify;
use crate::engine::{ControllerState, Decision, DecisionEngine, HoldReason};
use crate::metrics::ScalerMetrics;
use crate::snapshot::SnapshotFetcher;
use azp_core::ports::{AgentPoolGateway, WorkloadGateway};
use azp_core::{Result, ScalingConfig, Workload};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Drives one workload toward the demand of one agent pool.
pub struct ControlLoop {
    fetcher: SnapshotFetcher,
    workloads: Arc<dyn WorkloadGateway>,
    engine: DecisionEngine,
    metrics: Arc<ScalerMetrics>,
    pool_id: u64,
    workload: Workload,
    state: ControllerState,
}

impl ControlLoop {
    pub fn new(
        upstream: Arc<dyn AgentPoolGateway>,
        workloads: Arc<dyn WorkloadGateway>,
        config: ScalingConfig,
        metrics: Arc<ScalerMetrics>,
        pool_id: u64,
        workload: Workload,
    ) -> Self {
        Self {
            fetcher: SnapshotFetcher::new(upstream, workloads.clone()),
            workloads,
            engine: DecisionEngine::new(config),
            metrics,
            pool_id,
            workload,
            state: ControllerState::default(),
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    fn config(&self) -> &ScalingConfig {
        self.engine.config()
    }

    /// Run ticks until shutdown or an unrecoverable error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let poll_interval = self.config().poll_interval;

        info!(
            workload = %self.workload.friendly_name(),
            pool_id = self.pool_id,
            poll_interval = ?poll_interval,
            "Starting control loop"
        );

        loop {
            let wait = match self.tick().await {
                Ok(_) => poll_interval,
                Err(e) => match e.retry_after() {
                    Some(retry_after) => {
                        let wait = backoff(retry_after, poll_interval);
                        warn!(error = %e, "Rate limited by Azure DevOps");
                        info!(wait = ?wait, "Retrying after backoff");
                        self.metrics.record_rate_limited();
                        wait
                    }
                    None => return Err(e),
                },
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Control loop shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Evaluate one snapshot and apply the decision.
    pub async fn tick(&mut self) -> Result<Decision> {
        let snapshot = self.fetcher.fetch(self.pool_id, &self.workload).await?;
        let c = classify(&snapshot);
        self.metrics.record_classification(&c);

        trace!(
            pods = c.num_pods,
            running = c.num_running_pods,
            pending = c.num_pending_pods,
            failed = c.num_failed_pods,
            "Classified pods"
        );
        debug!(
            active_agents = c.num_active_agents(),
            pods = c.num_pods,
            queued_jobs = c.num_queued_jobs,
            "Classified agents"
        );

        let now = Utc::now();
        let decision = self.engine.evaluate(&c, &self.workload, &self.state, now);

        match decision {
            Decision::Scale { from, to } => {
                if from > self.config().max {
                    warn!(pods = from, max = self.config().max, "Pod count is over the maximum");
                }
                info!(
                    workload = %self.workload.friendly_name(),
                    from,
                    to,
                    "Scaling"
                );
                self.workloads.scale(&self.workload, to).await?;
                self.workload.replicas = to;
                if decision.is_scale_down() {
                    self.state.last_scale_down = Some(now);
                }
            }
            Decision::Hold { reason } => log_hold(&self.workload, c.num_pods, &reason),
        }

        self.metrics.record_decision(&decision);
        Ok(decision)
    }
}

/// Wait before retrying a rate-limited tick.
pub fn backoff(retry_after: Duration, poll_interval: Duration) -> Duration {
    retry_after.max(poll_interval)
}

fn log_hold(workload: &Workload, pods: u32, reason: &HoldReason) {
    let workload = workload.friendly_name();
    match reason {
        HoldReason::PodsNotReady { .. } | HoldReason::UnschedulablePods { .. } => {
            info!(workload = %workload, pods, reason = %reason, "Not scaling");
        }
        HoldReason::ActivePodAtHighestOrdinal { .. } | HoldReason::ScaleDownCooldown { .. } => {
            debug!(workload = %workload, pods, reason = %reason, "Not scaling down");
        }
        HoldReason::Balanced => {
            trace!(workload = %workload, pods, "Not scaling");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockUpstream, MockWorkloads, SET_NAME, agent, job, pod, workload};
    use azp_core::{AgentRef, Error, ScaleDownConfig};
    use pretty_assertions::assert_eq;

    fn config(poll_secs: u64) -> ScalingConfig {
        ScalingConfig {
            min: 1,
            max: 10,
            poll_interval: Duration::from_secs(poll_secs),
            scale_down: ScaleDownConfig {
                delay: Duration::ZERO,
                max: 1,
            },
        }
    }

    fn pods(n: u32) -> Vec<azp_core::PodRecord> {
        (0..n).map(|i| pod(&format!("{}-{}", SET_NAME, i))).collect()
    }

    struct Fixture {
        upstream: Arc<MockUpstream>,
        workloads: Arc<MockWorkloads>,
        metrics: Arc<ScalerMetrics>,
        num_pods: u32,
    }

    impl Fixture {
        fn new(num_pods: u32) -> Self {
            let workloads = Arc::new(MockWorkloads::default());
            workloads.set_pods(pods(num_pods));
            Self {
                upstream: Arc::new(MockUpstream::default()),
                workloads,
                metrics: ScalerMetrics::new(),
                num_pods,
            }
        }

        fn control_loop(&self, config: ScalingConfig) -> ControlLoop {
            ControlLoop::new(
                self.upstream.clone(),
                self.workloads.clone(),
                config,
                self.metrics.clone(),
                9,
                workload(self.num_pods),
            )
        }
    }

    #[tokio::test]
    async fn test_tick_scales_up_for_queued_jobs() {
        let fixture = Fixture::new(1);
        fixture
            .upstream
            .set_agents(vec![agent(1, "azp-agent-0", "online", Some(100))]);
        let busy = AgentRef {
            id: 1,
            name: "azp-agent-0".to_string(),
            status: None,
        };
        fixture
            .upstream
            .set_jobs(vec![job(101, vec![busy.clone()]), job(102, vec![busy])]);

        let mut control = fixture.control_loop(config(10));
        let decision = control.tick().await.unwrap();

        assert_eq!(decision, Decision::Scale { from: 1, to: 4 });
        assert_eq!(fixture.workloads.scales(), vec![4]);
        assert_eq!(control.state().last_scale_down, None);

        let metrics = fixture.metrics.snapshot();
        assert_eq!(metrics.scale_ups, 1);
        assert_eq!(metrics.last_scale_size, 3);
        assert_eq!(metrics.queued_jobs, 2);
    }

    #[tokio::test]
    async fn test_tick_without_change_does_not_write() {
        let fixture = Fixture::new(1);
        let mut control = fixture.control_loop(config(10));

        let decision = control.tick().await.unwrap();

        assert_eq!(
            decision,
            Decision::Hold {
                reason: HoldReason::Balanced
            }
        );
        assert!(fixture.workloads.scales().is_empty());
    }

    #[tokio::test]
    async fn test_scale_down_records_time() {
        let fixture = Fixture::new(3);
        let mut control = fixture.control_loop(config(10));

        let before = Utc::now();
        let decision = control.tick().await.unwrap();

        assert_eq!(decision, Decision::Scale { from: 3, to: 2 });
        assert!(control.state().last_scale_down.is_some_and(|at| at >= before));
        assert_eq!(fixture.metrics.snapshot().scale_downs, 1);
    }

    #[tokio::test]
    async fn test_failed_scale_write_keeps_state() {
        let fixture = Fixture::new(3);
        fixture.workloads.fail_scale_with(Error::Kubernetes(
            "statefulset/azp-agent failed with status 409: conflict".to_string(),
        ));
        let mut control = fixture.control_loop(config(10));

        let err = control.tick().await.unwrap_err();

        assert!(matches!(err, Error::Kubernetes(_)));
        assert_eq!(control.state().last_scale_down, None);
        assert_eq!(fixture.metrics.snapshot().scale_downs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_for_retry_after() {
        let fixture = Fixture::new(1);
        fixture.upstream.fail_jobs_with(Error::RateLimited {
            status: 429,
            endpoint: "/_apis/distributedtask/pools/9/jobrequests".to_string(),
            retry_after: Duration::from_secs(5),
        });
        let mut control = fixture.control_loop(config(2));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { control.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_secs(6)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let calls = fixture.upstream.job_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_secs(5));
        assert_eq!(fixture.metrics.snapshot().rate_limited, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_at_least_poll_interval() {
        let fixture = Fixture::new(1);
        fixture.upstream.fail_jobs_with(Error::RateLimited {
            status: 503,
            endpoint: "/_apis/distributedtask/pools/9/jobrequests".to_string(),
            retry_after: Duration::from_secs(1),
        });
        let mut control = fixture.control_loop(config(3));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { control.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_secs(4)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let calls = fixture.upstream.job_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_end_the_loop() {
        let fixture = Fixture::new(1);
        fixture.upstream.fail_jobs_with(Error::Http {
            status: 500,
            endpoint: "/_apis/distributedtask/pools/9/jobrequests".to_string(),
        });
        let mut control = fixture.control_loop(config(2));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let err = control.run(shutdown_rx).await.unwrap_err();

        assert!(matches!(err, Error::Http { status: 500, .. }));
        assert_eq!(fixture.upstream.job_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_every_poll_interval() {
        let fixture = Fixture::new(1);
        let mut control = fixture.control_loop(config(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { control.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(fixture.upstream.job_calls().len(), 3);
    }

    #[test]
    fn test_backoff() {
        assert_eq!(
            backoff(Duration::from_secs(5), Duration::from_secs(2)),
            Duration::from_secs(5)
        );
        assert_eq!(
            backoff(Duration::from_secs(1), Duration::from_secs(10)),
            Duration::from_secs(10)
        );
    }
}
