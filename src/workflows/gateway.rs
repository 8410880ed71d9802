use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::spec_builder::{self, BuildOptions};
use crate::configuration::GatewayConfig;
use crate::controllers::ControlPlane;
use crate::models::deployment::{DeploymentRequest, Provisioned};
use crate::models::pod::WorkloadInstance;
use crate::utils::error::GatewayError;
use crate::utils::retry::retry_with_backoff;

pub const DEFAULT_NAME: &str = "demo";
pub const DEFAULT_IMAGE: &str = "nginx:1.12";
pub const DEFAULT_REPLICAS: i64 = 2;
pub const DEFAULT_PORT: i64 = 80;

/// Handles list and ensure-deployment requests against the control plane.
///
/// Holds no per-request state; every call is an independent round trip,
/// bounded by the configured timeout and retried only on `Unreachable`.
pub struct Gateway {
    control_plane: Arc<dyn ControlPlane>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(control_plane: Arc<dyn ControlPlane>, config: GatewayConfig) -> Self {
        Gateway {
            control_plane,
            config,
        }
    }

    /// Lists the pods of the configured namespace.
    pub async fn list_pods(&self) -> Result<Vec<WorkloadInstance>, GatewayError> {
        let namespace = self.config.namespace.as_str();
        let control_plane = self.control_plane.as_ref();
        let timeout = self.config.request_timeout();

        debug!("listing pods in {}", namespace);

        retry_with_backoff(
            &self.config.retry,
            "list_pods",
            GatewayError::is_retryable,
            move || bounded(timeout, control_plane.list_pods(namespace)),
        )
        .await
    }

    /// Validates the request and creates the deployment it describes.
    ///
    /// Invalid requests fail with `InvalidSpec` before the control plane is
    /// contacted. An existing deployment is reported as `AlreadyExists` when
    /// `idempotent_create` is enabled or when it surfaced on a retried attempt,
    /// and as `Conflict` otherwise.
    pub async fn ensure_deployment(
        &self,
        request: DeploymentRequest,
    ) -> Result<Provisioned, GatewayError> {
        let options = BuildOptions {
            container_name: request.container_name,
            port_name: None,
            protocol: request.protocol,
            selector_labels: request.labels,
        };
        let spec = spec_builder::build_with(
            request.name.as_deref().unwrap_or(DEFAULT_NAME),
            request
                .namespace
                .as_deref()
                .unwrap_or(&self.config.deployment_namespace),
            request.image.as_deref().unwrap_or(DEFAULT_IMAGE),
            request.replicas.unwrap_or(DEFAULT_REPLICAS),
            request.port.unwrap_or(DEFAULT_PORT),
            &options,
        )?;

        let control_plane = self.control_plane.as_ref();
        let timeout = self.config.request_timeout();
        let spec_ref = &spec;
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;

        let created = retry_with_backoff(
            &self.config.retry,
            "create_deployment",
            GatewayError::is_retryable,
            move || {
                attempts_ref.fetch_add(1, Ordering::Relaxed);
                bounded(timeout, control_plane.create_deployment(spec_ref))
            },
        )
        .await;

        // Only `Unreachable` is retried, so an earlier attempt may have been
        // applied even though its response was lost.
        let retried = attempts.load(Ordering::Relaxed) > 1;

        match created {
            Ok(metadata) => {
                info!("created deployment {}/{}", metadata.namespace, metadata.name);
                Ok(Provisioned::Created(metadata))
            }
            Err(GatewayError::Conflict(message)) if self.config.idempotent_create || retried => {
                let warning = if retried {
                    format!("an earlier attempt may have created it: {}", message)
                } else {
                    message
                };
                warn!(
                    "deployment {}/{} already exists: {}",
                    spec.namespace, spec.name, warning
                );
                Ok(Provisioned::AlreadyExists {
                    name: spec.name,
                    namespace: spec.namespace,
                    warning,
                })
            }
            Err(err) => Err(err),
        }
    }
}

/// Abandons `call` once `timeout` elapses; dropping the future cancels the request.
async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Unreachable(format!(
            "control plane did not respond within {}ms",
            timeout.as_millis()
        ))),
    }
}
