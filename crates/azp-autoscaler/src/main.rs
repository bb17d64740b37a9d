//! azp-agent-autoscaler entrypoint.

use anyhow::{Context, anyhow};
use azp_core::ports::{AgentPoolGateway, WorkloadGateway};
use azp_devops::DevOpsClient;
use azp_kube::KubeClient;
use azp_scaler::{ControlLoop, ScalerMetrics, discover};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod args;
mod health;
mod logging;

use args::{Args, Settings};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(args.log_level.parse().unwrap_or_default(), args.log_format);

    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(settings).await {
        error!(error = %format!("{e:#}"), "Exiting azp-agent-autoscaler");
        std::process::exit(1);
    }

    info!("Exiting azp-agent-autoscaler");
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let metrics = ScalerMetrics::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut server = tokio::spawn(health::serve(
        settings.port,
        health::create_router(metrics.clone()),
        shutdown_rx.clone(),
    ));

    let upstream: Arc<dyn AgentPoolGateway> = Arc::new(DevOpsClient::new(&settings.devops)?);
    let workloads: Arc<dyn WorkloadGateway> =
        Arc::new(KubeClient::infer(settings.request_timeout).await?);

    let discovery = discover(upstream.as_ref(), workloads.as_ref(), &settings.target)
        .await
        .with_context(|| {
            format!(
                "Error starting the autoscaler for {} in namespace {}",
                settings.target.friendly_name(),
                settings.target.namespace
            )
        })?;
    info!(
        workload = %discovery.workload.friendly_name(),
        pool = %discovery.pool.name,
        pool_id = discovery.pool.id,
        replicas = discovery.workload.replicas,
        "Discovered agent pool"
    );

    let workload_name = discovery.workload.friendly_name();
    let mut control = ControlLoop::new(
        upstream,
        workloads,
        settings.scaling,
        metrics,
        discovery.pool.id,
        discovery.workload,
    );

    let outcome = tokio::select! {
        res = control.run(shutdown_rx) => {
            res.with_context(|| format!("Error autoscaling {}", workload_name))
        }
        res = &mut server => {
            let err = match res {
                Ok(Ok(())) => anyhow!("health server stopped"),
                Ok(Err(e)) => anyhow::Error::from(e),
                Err(e) => anyhow::Error::from(e),
            };
            return Err(err.context("Error serving health checks"));
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(true);
    match server.await {
        Ok(Err(e)) => warn!(error = %e, "Health server failed while shutting down"),
        Err(e) => warn!(error = %e, "Health server task failed"),
        Ok(Ok(())) => {}
    }

    outcome
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to register Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
