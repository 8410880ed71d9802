use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use serde::Serialize;

/// A simplified view of a pod phase.
///
/// Unrecognized or missing phases map to [`PodPhase::Unknown`].
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(value: &str) -> Self {
        match value {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatusSummary {
    pub name: String,
    pub ready: bool,
    pub restart_count: i32,
}

impl From<ContainerStatus> for ContainerStatusSummary {
    fn from(status: ContainerStatus) -> Self {
        ContainerStatusSummary {
            name: status.name,
            ready: status.ready,
            restart_count: status.restart_count,
        }
    }
}

/// Immutable snapshot of a pod as reported by the control plane.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInstance {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub container_statuses: Vec<ContainerStatusSummary>,
}

impl From<Pod> for WorkloadInstance {
    fn from(pod: Pod) -> Self {
        let status = pod.status.unwrap_or_default();

        WorkloadInstance {
            name: pod.metadata.name.unwrap_or_default(),
            namespace: pod.metadata.namespace.unwrap_or_default(),
            phase: status
                .phase
                .as_deref()
                .map(PodPhase::from)
                .unwrap_or(PodPhase::Unknown),
            container_statuses: status
                .container_statuses
                .unwrap_or_default()
                .into_iter()
                .map(ContainerStatusSummary::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodStatus};
    use kube::api::ObjectMeta;
    use serde_json::json;

    use super::{PodPhase, WorkloadInstance};

    #[test]
    fn converts_pod_with_container_statuses() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("demo-7f9c".to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                container_statuses: Some(vec![
                    ContainerStatus {
                        name: "web".to_string(),
                        ready: true,
                        restart_count: 2,
                        ..ContainerStatus::default()
                    },
                    ContainerStatus {
                        name: "sidecar".to_string(),
                        ready: false,
                        restart_count: 0,
                        ..ContainerStatus::default()
                    },
                ]),
                ..PodStatus::default()
            }),
            ..Pod::default()
        };

        let instance = WorkloadInstance::from(pod);

        assert_eq!(instance.name, "demo-7f9c");
        assert_eq!(instance.phase, PodPhase::Running);
        let names: Vec<&str> = instance
            .container_statuses
            .iter()
            .map(|status| status.name.as_str())
            .collect();
        assert_eq!(names, vec!["web", "sidecar"]);
        assert_eq!(instance.container_statuses[0].restart_count, 2);
    }

    #[test]
    fn missing_status_is_unknown() {
        let instance = WorkloadInstance::from(Pod::default());

        assert_eq!(instance.phase, PodPhase::Unknown);
        assert!(instance.container_statuses.is_empty());
    }

    #[test]
    fn unrecognized_phase_is_unknown() {
        assert_eq!(PodPhase::from("Evicted"), PodPhase::Unknown);
        assert_eq!(PodPhase::from("Succeeded"), PodPhase::Succeeded);
    }

    #[test]
    fn serializes_camel_case() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("demo".to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            status: Some(PodStatus {
                phase: Some("Pending".to_string()),
                container_statuses: Some(vec![ContainerStatus {
                    name: "web".to_string(),
                    ready: false,
                    restart_count: 1,
                    ..ContainerStatus::default()
                }]),
                ..PodStatus::default()
            }),
            ..Pod::default()
        };

        let value = serde_json::to_value(WorkloadInstance::from(pod)).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "demo",
                "namespace": "default",
                "phase": "Pending",
                "containerStatuses": [{"name": "web", "ready": false, "restartCount": 1}]
            })
        );
    }
}
