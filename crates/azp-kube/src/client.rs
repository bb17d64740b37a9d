use crate::convert::{
    find_conflicting_autoscaler, kube_error, pod_record, update_scale, workload_error,
    workload_from_stateful_set,
};
use async_trait::async_trait;
use azp_core::ports::WorkloadGateway;
use azp_core::{EnvSource, Error, PodRecord, Result, Workload, WorkloadKind, WorkloadRef};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret};
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, Config};
use std::time::Duration;
use tracing::{debug, info};

/// Kubernetes adapter for the agent workload.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster environment or the local kubeconfig.
    pub async fn infer(request_timeout: Duration) -> Result<Self> {
        let mut config = Config::infer()
            .await
            .map_err(|e| Error::Kubernetes(format!("Could not load Kubernetes config: {}", e)))?;
        config.connect_timeout = Some(request_timeout);
        config.read_timeout = Some(request_timeout);
        config.write_timeout = Some(request_timeout);

        let client = Client::try_from(config)
            .map_err(|e| Error::Kubernetes(format!("Could not create Kubernetes client: {}", e)))?;
        Ok(Self::new(client))
    }

    fn stateful_sets(&self, namespace: &str) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn config_map_value(&self, namespace: &str, name: &str, key: &str) -> Result<String> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api
            .get_opt(name)
            .await
            .map_err(|e| kube_error(&format!("configmap/{}", name), e))?
            .ok_or_else(|| Error::EnvVar(format!("ConfigMap {} not found", name)))?;

        config_map
            .data
            .and_then(|mut data| data.remove(key))
            .ok_or_else(|| Error::EnvVar(format!("Key {} not found in ConfigMap {}", key, name)))
    }

    async fn secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<String> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .map_err(|e| kube_error(&format!("secret/{}", name), e))?
            .ok_or_else(|| Error::EnvVar(format!("Secret {} not found", name)))?;

        let bytes = secret
            .data
            .and_then(|mut data| data.remove(key))
            .ok_or_else(|| Error::EnvVar(format!("Key {} not found in Secret {}", key, name)))?;

        String::from_utf8(bytes.0).map_err(|_| {
            Error::EnvVar(format!(
                "Key {} in Secret {} is not valid UTF-8",
                key, name
            ))
        })
    }
}

#[async_trait]
impl WorkloadGateway for KubeClient {
    async fn get_workload(&self, workload: &WorkloadRef) -> Result<Workload> {
        match workload.kind {
            WorkloadKind::StatefulSet => {
                let set = self
                    .stateful_sets(&workload.namespace)
                    .get_opt(&workload.name)
                    .await
                    .map_err(|e| workload_error(&workload.friendly_name(), e))?
                    .ok_or_else(|| Error::WorkloadNotFound(workload.friendly_name()))?;
                workload_from_stateful_set(&set)
            }
        }
    }

    async fn verify_no_conflicting_autoscaler(&self, workload: &WorkloadRef) -> Result<()> {
        let api: Api<HorizontalPodAutoscaler> =
            Api::namespaced(self.client.clone(), &workload.namespace);
        let autoscalers = api
            .list(&ListParams::default())
            .await
            .map_err(|e| kube_error("horizontalpodautoscalers", e))?;

        match find_conflicting_autoscaler(&autoscalers.items, workload) {
            Some(hpa) => {
                debug!(hpa = %hpa, workload = %workload.friendly_name(), "Found conflicting autoscaler");
                Err(Error::ConflictingAutoscaler(workload.friendly_name()))
            }
            None => Ok(()),
        }
    }

    async fn list_pods(&self, workload: &Workload) -> Result<Vec<PodRecord>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &workload.namespace);
        let pods = api
            .list(&ListParams::default().labels(&workload.selector))
            .await
            .map_err(|e| kube_error("pods", e))?;

        Ok(pods.items.iter().map(pod_record).collect())
    }

    async fn scale(&self, workload: &Workload, replicas: u32) -> Result<()> {
        let api = self.stateful_sets(&workload.namespace);
        let name = workload.friendly_name();

        let mut scale = api
            .get_scale(&workload.name)
            .await
            .map_err(|e| workload_error(&name, e))?;

        let current = scale.spec.as_ref().and_then(|s| s.replicas);
        if !update_scale(&mut scale, replicas)? {
            debug!(workload = %name, replicas, "Scale already at desired replicas");
            return Ok(());
        }

        let body = serde_json::to_vec(&scale)?;
        api.replace_scale(&workload.name, &PostParams::default(), body)
            .await
            .map_err(|e| workload_error(&name, e))?;

        info!(workload = %name, from = ?current, to = replicas, "Scaled workload");
        Ok(())
    }

    async fn resolve_env(&self, workload: &Workload, name: &str) -> Result<String> {
        let var = workload.env_var(name).ok_or_else(|| {
            Error::EnvVar(format!(
                "Could not find environment variable {} in {}",
                name,
                workload.friendly_name()
            ))
        })?;

        match &var.source {
            EnvSource::Value(value) => Ok(value.clone()),
            EnvSource::ConfigMapKey { name: cm, key } => {
                self.config_map_value(&workload.namespace, cm, key).await
            }
            EnvSource::SecretKey { name: secret, key } => {
                self.secret_value(&workload.namespace, secret, key).await
            }
            EnvSource::Unsupported(kind) => Err(Error::EnvVar(format!(
                "Environment variable {} uses an unsupported source ({})",
                name, kind
            ))),
        }
    }
}
