//! Conversions from Kubernetes API objects to domain types.

use azp_core::{
    EnvSource, EnvVar, Error, PodPhase, PodRecord, Result, Workload, WorkloadKind, WorkloadRef,
};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::autoscaling::v1::Scale;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{self as core, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// Build the workload descriptor of a StatefulSet.
pub fn workload_from_stateful_set(set: &StatefulSet) -> Result<Workload> {
    let name = set
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::Kubernetes("StatefulSet has no name".to_string()))?;
    let spec = set
        .spec
        .as_ref()
        .ok_or_else(|| Error::Kubernetes(format!("statefulset/{} has no spec", name)))?;

    let replicas = spec.replicas.unwrap_or(1);
    let replicas = u32::try_from(replicas).map_err(|_| {
        Error::Kubernetes(format!(
            "statefulset/{} has a negative replica count {}",
            name, replicas
        ))
    })?;

    let env = spec
        .template
        .spec
        .as_ref()
        .map(|pod_spec| {
            pod_spec
                .containers
                .iter()
                .flat_map(|c| c.env.iter().flatten())
                .map(env_var)
                .collect()
        })
        .unwrap_or_default();

    Ok(Workload {
        kind: WorkloadKind::StatefulSet,
        namespace: set.metadata.namespace.clone().unwrap_or_default(),
        name,
        replicas,
        selector: format_label_selector(&spec.selector),
        env,
    })
}

fn env_var(env: &core::EnvVar) -> EnvVar {
    let source = match (&env.value, &env.value_from) {
        (Some(value), _) if !value.is_empty() => EnvSource::Value(value.clone()),
        (_, Some(from)) => {
            if let Some(cm) = &from.config_map_key_ref {
                EnvSource::ConfigMapKey {
                    name: cm.name.clone(),
                    key: cm.key.clone(),
                }
            } else if let Some(secret) = &from.secret_key_ref {
                EnvSource::SecretKey {
                    name: secret.name.clone(),
                    key: secret.key.clone(),
                }
            } else if from.field_ref.is_some() {
                EnvSource::Unsupported("fieldRef".to_string())
            } else if from.resource_field_ref.is_some() {
                EnvSource::Unsupported("resourceFieldRef".to_string())
            } else {
                EnvSource::Unsupported("empty valueFrom".to_string())
            }
        }
        (Some(value), None) => EnvSource::Value(value.clone()),
        (None, None) => EnvSource::Value(String::new()),
    };

    EnvVar {
        name: env.name.clone(),
        source,
    }
}

/// Format a label selector in `kubectl` syntax, ex: `app=azp,tier in (a,b)`.
pub fn format_label_selector(selector: &LabelSelector) -> String {
    let mut parts: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.as_deref().unwrap_or_default().join(",");
        let part = match expr.operator.as_str() {
            "In" => format!("{} in ({})", expr.key, values),
            "NotIn" => format!("{} notin ({})", expr.key, values),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => format!("{} {} ({})", expr.key, other.to_lowercase(), values),
        };
        parts.push(part);
    }

    parts.join(",")
}

/// Reduce a pod to the fields scaling decisions use.
pub fn pod_record(pod: &Pod) -> PodRecord {
    let status = pod.status.as_ref();

    let all_containers_running = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| {
            statuses.iter().all(|cs| {
                cs.state
                    .as_ref()
                    .is_some_and(|st| st.running.is_some() && st.terminated.is_none())
            })
        })
        .unwrap_or(true);

    let unschedulable = status
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions.iter().any(|c| {
                c.type_ == "PodScheduled"
                    && c.status == "False"
                    && c.reason.as_deref() == Some("Unschedulable")
            })
        });

    PodRecord {
        name: pod.metadata.name.clone().unwrap_or_default(),
        phase: PodPhase::from_status(status.and_then(|s| s.phase.as_deref())),
        all_containers_running,
        unschedulable,
    }
}

/// Name of the first autoscaler targeting the workload, if any.
pub fn find_conflicting_autoscaler(
    autoscalers: &[HorizontalPodAutoscaler],
    workload: &WorkloadRef,
) -> Option<String> {
    autoscalers
        .iter()
        .find(|hpa| {
            hpa.spec.as_ref().is_some_and(|spec| {
                spec.scale_target_ref
                    .kind
                    .eq_ignore_ascii_case(workload.kind.as_str())
                    && spec.scale_target_ref.name == workload.name
            })
        })
        .map(|hpa| hpa.metadata.name.clone().unwrap_or_default())
}

/// Set the desired replica count on a scale subresource.
///
/// Returns `false` and leaves `scale` untouched when it already asks for
/// `replicas`.
pub fn update_scale(scale: &mut Scale, replicas: u32) -> Result<bool> {
    let desired = i32::try_from(replicas)
        .map_err(|_| Error::Internal(format!("Replica count {} is out of range", replicas)))?;
    if scale.spec.as_ref().and_then(|s| s.replicas) == Some(desired) {
        return Ok(false);
    }
    scale.spec.get_or_insert_with(Default::default).replicas = Some(desired);
    Ok(true)
}

/// Map a failed call on the workload itself, where 404 means it is gone.
pub fn workload_error(workload: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => Error::WorkloadNotFound(workload.to_string()),
        other => kube_error(workload, other),
    }
}

/// Map a failed call on any other resource.
pub fn kube_error(resource: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ae) => Error::Kubernetes(format!(
            "{} failed with status {}: {}",
            resource, ae.code, ae.message
        )),
        other => Error::Kubernetes(format!("{}: {}", resource, other)),
    }
}
