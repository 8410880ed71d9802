use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::workload_spec::Protocol;

/// Metadata of a deployment as returned by the control plane after creation.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMetadata {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
    pub resource_version: Option<String>,
    pub creation_timestamp: Option<String>,
}

/// Parameters of an ensure-deployment request. Missing fields fall back to
/// the demo workload defaults.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub image: Option<String>,
    pub replicas: Option<i64>,
    pub port: Option<i64>,
    pub container_name: Option<String>,
    pub protocol: Option<Protocol>,
    pub labels: Option<BTreeMap<String, String>>,
}

/// Query string form of [`DeploymentRequest`]; labels cannot be expressed flat.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentQuery {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub image: Option<String>,
    pub replicas: Option<i64>,
    pub port: Option<i64>,
    pub container_name: Option<String>,
    pub protocol: Option<Protocol>,
}

impl From<DeploymentQuery> for DeploymentRequest {
    fn from(query: DeploymentQuery) -> Self {
        DeploymentRequest {
            name: query.name,
            namespace: query.namespace,
            image: query.image,
            replicas: query.replicas,
            port: query.port,
            container_name: query.container_name,
            protocol: query.protocol,
            labels: None,
        }
    }
}

/// Outcome of an ensure-deployment request.
#[derive(Debug, Clone, PartialEq)]
pub enum Provisioned {
    Created(DeploymentMetadata),
    /// The deployment already existed and idempotent creation is enabled.
    AlreadyExists {
        name: String,
        namespace: String,
        warning: String,
    },
}
