use std::env;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use http::Uri;
use log::debug;
use tokio::time::Instant;

use crate::models::credential::ClusterCredential;
use crate::utils::error::GatewayError;

const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const TOKEN_FILE: &str = "token";
const CA_FILE: &str = "ca.crt";

/// Source of control-plane credentials from the environment the gateway runs in.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self) -> Result<ClusterCredential, GatewayError>;
}

/// Resolves the pod's service account identity: API server address from the
/// `KUBERNETES_SERVICE_*` variables, token and CA bundle from the mounted
/// service account directory.
#[derive(Debug, Clone)]
pub struct InClusterResolver {
    host: Option<String>,
    port: Option<String>,
    token_path: PathBuf,
    ca_path: PathBuf,
    token_lifetime: Duration,
}

impl InClusterResolver {
    /// Reads the service address from the process environment.
    ///
    /// # Arguments
    /// - `token_lifetime` - How long a token read from disk is trusted before it is read again.
    ///   The kubelet rotates projected tokens in place.
    pub fn from_env(token_lifetime: Duration) -> Self {
        let account_dir = PathBuf::from(SERVICE_ACCOUNT_DIR);

        InClusterResolver {
            host: env::var(SERVICE_HOST_ENV).ok(),
            port: env::var(SERVICE_PORT_ENV).ok(),
            token_path: account_dir.join(TOKEN_FILE),
            ca_path: account_dir.join(CA_FILE),
            token_lifetime,
        }
    }

    pub fn new(
        host: Option<String>,
        port: Option<String>,
        token_path: PathBuf,
        ca_path: PathBuf,
        token_lifetime: Duration,
    ) -> Self {
        InClusterResolver {
            host,
            port,
            token_path,
            ca_path,
            token_lifetime,
        }
    }

    fn endpoint(&self) -> Result<Uri, GatewayError> {
        let host = non_empty(self.host.as_deref())
            .ok_or_else(|| GatewayError::auth(format!("{} is not set", SERVICE_HOST_ENV)))?;
        let port = non_empty(self.port.as_deref())
            .ok_or_else(|| GatewayError::auth(format!("{} is not set", SERVICE_PORT_ENV)))?;

        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };

        format!("https://{}", authority)
            .parse::<Uri>()
            .map_err(|err| GatewayError::auth(format!("invalid control plane endpoint: {}", err)))
    }
}

#[async_trait]
impl CredentialResolver for InClusterResolver {
    async fn resolve(&self) -> Result<ClusterCredential, GatewayError> {
        let endpoint = self.endpoint()?;

        let token = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|err| {
                GatewayError::auth(format!(
                    "unable to read service account token {}: {}",
                    self.token_path.display(),
                    err
                ))
            })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(GatewayError::auth("service account token is empty"));
        }

        let ca_bundle = tokio::fs::read(&self.ca_path).await.map_err(|err| {
            GatewayError::auth(format!(
                "unable to read CA bundle {}: {}",
                self.ca_path.display(),
                err
            ))
        })?;
        if ca_bundle.is_empty() {
            return Err(GatewayError::auth("CA bundle is empty"));
        }

        debug!("resolved in-cluster credential for {}", endpoint);

        Ok(ClusterCredential {
            endpoint,
            bearer_token: token.to_string().into(),
            ca_bundle,
            expires_at: Some(Instant::now() + self.token_lifetime),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
