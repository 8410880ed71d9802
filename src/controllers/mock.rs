use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::cluster::ControlPlane;
use crate::models::deployment::DeploymentMetadata;
use crate::models::pod::WorkloadInstance;
use crate::models::workload_spec::WorkloadSpec;
use crate::utils::error::GatewayError;

/// In-memory control plane for gateway and route tests.
#[derive(Default)]
pub struct MockControlPlane {
    pub pods: Vec<WorkloadInstance>,
    /// Delay applied to every call, to simulate a hung control plane.
    pub delay: Option<Duration>,
    /// Errors returned, in order, by the next calls before normal behaviour resumes.
    failures: Mutex<VecDeque<GatewayError>>,
    deployments: Mutex<BTreeSet<(String, String)>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MockControlPlane {
    pub fn with_pods(pods: Vec<WorkloadInstance>) -> Self {
        MockControlPlane {
            pods,
            ..MockControlPlane::default()
        }
    }

    pub fn hanging(delay: Duration) -> Self {
        MockControlPlane {
            delay: Some(delay),
            ..MockControlPlane::default()
        }
    }

    pub fn fail_next(self, error: GatewayError) -> Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    pub fn with_deployment(self, namespace: &str, name: &str) -> Self {
        self.deployments
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()));
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> Result<(), GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<WorkloadInstance>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        Ok(self
            .pods
            .iter()
            .filter(|pod| pod.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn create_deployment(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<DeploymentMetadata, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        let key = (spec.namespace.clone(), spec.name.clone());
        if !self.deployments.lock().unwrap().insert(key) {
            return Err(GatewayError::Conflict(format!(
                "deployments.apps \"{}\" already exists",
                spec.name
            )));
        }

        Ok(DeploymentMetadata {
            name: spec.name.clone(),
            namespace: spec.namespace.clone(),
            uid: Some(format!("uid-{}", spec.name)),
            resource_version: Some("1".to_string()),
            creation_timestamp: Some("2026-01-01T00:00:00Z".to_string()),
        })
    }
}
