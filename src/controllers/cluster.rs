use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, Pod, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{ListParams, ObjectMeta, PostParams};
use kube::{Api, Client, Config};
use log::debug;
use secrecy::ExposeSecret;
use tokio::sync::RwLock;

use crate::credentials::CredentialCache;
use crate::models::credential::ClusterCredential;
use crate::models::deployment::DeploymentMetadata;
use crate::models::pod::WorkloadInstance;
use crate::models::workload_spec::WorkloadSpec;
use crate::utils::error::GatewayError;

/// Page size used when listing pods; pages are followed until exhausted.
const LIST_PAGE_SIZE: u32 = 500;

/// Operations the gateway needs from the cluster control plane.
///
/// Implementations make a single attempt per call; retries and timeouts are
/// the caller's concern.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Lists every pod in `namespace`. Either all pages are returned or an error.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<WorkloadInstance>, GatewayError>;

    /// Creates the deployment described by `spec`. An existing deployment with
    /// the same name yields [`GatewayError::Conflict`].
    async fn create_deployment(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<DeploymentMetadata, GatewayError>;
}

/// Builds a `kube` client for a resolved credential.
type Connector = dyn Fn(&ClusterCredential, Duration) -> Result<Client, GatewayError> + Send + Sync;

/// [`ControlPlane`] backed by the `kube` client, authenticated with the
/// credentials held by a [`CredentialCache`].
pub struct KubeControlPlane {
    credentials: CredentialCache,
    request_timeout: Duration,
    connector: Box<Connector>,
    client: RwLock<Option<(Arc<ClusterCredential>, Client)>>,
}

impl KubeControlPlane {
    pub fn new(credentials: CredentialCache, request_timeout: Duration) -> Self {
        KubeControlPlane {
            credentials,
            request_timeout,
            connector: Box::new(build_client),
            client: RwLock::new(None),
        }
    }

    #[cfg(test)]
    fn with_connector<C>(credentials: CredentialCache, connector: C) -> Self
    where
        C: Fn(&ClusterCredential, Duration) -> Result<Client, GatewayError> + Send + Sync + 'static,
    {
        KubeControlPlane {
            credentials,
            request_timeout: Duration::from_secs(5),
            connector: Box::new(connector),
            client: RwLock::new(None),
        }
    }

    /// Returns a client for the current credential, rebuilding it only when
    /// the credential was refreshed.
    async fn client(&self) -> Result<(Arc<ClusterCredential>, Client), GatewayError> {
        let credential = self.credentials.get().await?;

        if let Some((cached, client)) = self.client.read().await.as_ref() {
            if Arc::ptr_eq(cached, &credential) {
                return Ok((credential, client.clone()));
            }
        }

        debug!("building control plane client for {}", credential.endpoint);
        let client = (self.connector)(&credential, self.request_timeout)?;
        *self.client.write().await = Some((credential.clone(), client.clone()));

        Ok((credential, client))
    }

    /// Drops the credential if the control plane rejected it.
    async fn reject(
        &self,
        credential: &Arc<ClusterCredential>,
        error: GatewayError,
    ) -> GatewayError {
        if let GatewayError::AuthFailure {
            forbidden: false, ..
        } = error
        {
            self.credentials.invalidate(credential).await;
        }

        error
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<WorkloadInstance>, GatewayError> {
        debug!("list_pods in {}", namespace);

        let (credential, client) = self.client().await?;
        let api: Api<Pod> = Api::namespaced(client, namespace);

        let mut instances = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
            if let Some(token) = continue_token.as_deref() {
                params = params.continue_token(token);
            }

            let page = match api.list(&params).await {
                Ok(page) => page,
                Err(err) => return Err(self.reject(&credential, listing_error(err)).await),
            };

            instances.extend(page.items.into_iter().map(WorkloadInstance::from));

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        Ok(instances)
    }

    async fn create_deployment(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<DeploymentMetadata, GatewayError> {
        debug!("create_deployment {}/{}", spec.namespace, spec.name);

        let deployment = render_deployment(spec)?;
        let (credential, client) = self.client().await?;
        let api: Api<Deployment> = Api::namespaced(client, &spec.namespace);

        match api.create(&PostParams::default(), &deployment).await {
            Ok(created) => Ok(deployment_metadata(created, spec)),
            Err(err) => Err(self.reject(&credential, err.into()).await),
        }
    }
}

/// Listing fails only with auth, transport or upstream errors. Any other
/// status from the control plane is reported as an upstream failure.
fn listing_error(error: kube::Error) -> GatewayError {
    match error {
        kube::Error::Api(response) if !matches!(response.code, 401 | 403) => {
            GatewayError::Upstream {
                status: response.code,
                message: response.message,
            }
        }
        other => match GatewayError::from(other) {
            GatewayError::InvalidSpec(message)
            | GatewayError::NotFound(message)
            | GatewayError::Conflict(message) => GatewayError::Upstream {
                status: 400,
                message,
            },
            error => error,
        },
    }
}

fn build_client(
    credential: &ClusterCredential,
    request_timeout: Duration,
) -> Result<Client, GatewayError> {
    let mut config = Config::new(credential.endpoint.clone());
    config.root_cert = Some(decode_ca_bundle(&credential.ca_bundle)?);
    config.auth_info.token = Some(credential.bearer_token.expose_secret().to_string().into());
    config.connect_timeout = Some(request_timeout);
    config.read_timeout = Some(request_timeout);
    config.write_timeout = Some(request_timeout);

    Client::try_from(config)
        .map_err(|err| GatewayError::auth(format!("unable to build control plane client: {}", err)))
}

/// Decodes a PEM bundle into DER certificates.
fn decode_ca_bundle(ca_bundle: &[u8]) -> Result<Vec<Vec<u8>>, GatewayError> {
    let mut reader = BufReader::new(ca_bundle);
    let mut certs = Vec::new();

    for cert in rustls_pemfile::certs(&mut reader) {
        let cert =
            cert.map_err(|err| GatewayError::auth(format!("malformed CA bundle: {}", err)))?;
        certs.push(cert.as_ref().to_vec());
    }

    if certs.is_empty() {
        return Err(GatewayError::auth("CA bundle contains no certificates"));
    }

    Ok(certs)
}

/// Renders an `apps/v1` Deployment. Selector labels are applied to the pod
/// template as well so the selector matches the pods it creates.
fn render_deployment(spec: &WorkloadSpec) -> Result<Deployment, GatewayError> {
    if spec.replicas < 0 {
        return Err(GatewayError::InvalidSpec(format!(
            "replicas must be >= 0, got {}",
            spec.replicas
        )));
    }

    let ports = spec
        .ports
        .iter()
        .map(|port| ContainerPort {
            name: Some(port.name.clone()),
            protocol: Some(port.protocol.as_str().to_string()),
            container_port: port.container_port,
            ..ContainerPort::default()
        })
        .collect();

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            labels: Some(spec.selector_labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas),
            selector: LabelSelector {
                match_labels: Some(spec.selector_labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(spec.selector_labels.clone()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: spec.container_name.clone(),
                        image: Some(spec.image.clone()),
                        ports: Some(ports),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

fn deployment_metadata(created: Deployment, spec: &WorkloadSpec) -> DeploymentMetadata {
    let metadata = created.metadata;

    DeploymentMetadata {
        name: metadata.name.unwrap_or_else(|| spec.name.clone()),
        namespace: metadata
            .namespace
            .unwrap_or_else(|| spec.namespace.clone()),
        uid: metadata.uid,
        resource_version: metadata.resource_version,
        creation_timestamp: metadata
            .creation_timestamp
            .and_then(|timestamp| serde_json::to_value(timestamp).ok())
            .and_then(|value| value.as_str().map(String::from)),
    }
}
