use std::collections::BTreeMap;

use crate::models::workload_spec::{PortSpec, Protocol, WorkloadSpec};
use crate::utils::error::GatewayError;

/// Label key carrying the application identifier in selectors.
pub const APP_LABEL: &str = "app";
pub const DEFAULT_CONTAINER_NAME: &str = "web";
pub const DEFAULT_PORT_NAME: &str = "http";

const MAX_DNS_LABEL_LENGTH: usize = 63;

/// Optional overrides for [`build_with`]. Unset fields use the defaults.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub container_name: Option<String>,
    pub port_name: Option<String>,
    pub protocol: Option<Protocol>,
    pub selector_labels: Option<BTreeMap<String, String>>,
}

/// Renders a workload spec with default container name, port name, protocol
/// and selector labels.
pub fn build(
    name: &str,
    namespace: &str,
    image: &str,
    replicas: i64,
    container_port: i64,
) -> Result<WorkloadSpec, GatewayError> {
    build_with(
        name,
        namespace,
        image,
        replicas,
        container_port,
        &BuildOptions::default(),
    )
}

/// Validates the parameters in a fixed order (name, namespace, image,
/// replicas, port) and renders the spec. The first failing check wins.
pub fn build_with(
    name: &str,
    namespace: &str,
    image: &str,
    replicas: i64,
    container_port: i64,
    options: &BuildOptions,
) -> Result<WorkloadSpec, GatewayError> {
    if !is_dns_label(name) {
        return Err(GatewayError::InvalidSpec(format!(
            "name {:?} must be a non-empty DNS label (lowercase alphanumerics and '-', at most {} characters)",
            name, MAX_DNS_LABEL_LENGTH
        )));
    }
    if !is_dns_label(namespace) {
        return Err(GatewayError::InvalidSpec(format!(
            "namespace {:?} must be a non-empty DNS label",
            namespace
        )));
    }
    if image.trim().is_empty() {
        return Err(GatewayError::InvalidSpec(
            "image must not be empty".to_string(),
        ));
    }
    if replicas < 0 {
        return Err(GatewayError::InvalidSpec(format!(
            "replicas must be >= 0, got {}",
            replicas
        )));
    }
    let replicas = i32::try_from(replicas).map_err(|_| {
        GatewayError::InvalidSpec(format!("replicas {} exceeds {}", replicas, i32::MAX))
    })?;
    if !(1..=65535).contains(&container_port) {
        return Err(GatewayError::InvalidSpec(format!(
            "containerPort must be in 1..65535, got {}",
            container_port
        )));
    }

    let selector_labels = match &options.selector_labels {
        Some(labels) if labels.is_empty() => {
            return Err(GatewayError::InvalidSpec(
                "selector labels must not be empty".to_string(),
            ))
        }
        Some(labels) => labels.clone(),
        None => BTreeMap::from([(APP_LABEL.to_string(), name.to_string())]),
    };

    let container_name = options
        .container_name
        .clone()
        .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string());
    if !is_dns_label(&container_name) {
        return Err(GatewayError::InvalidSpec(format!(
            "container name {:?} must be a DNS label",
            container_name
        )));
    }

    Ok(WorkloadSpec {
        name: name.to_string(),
        namespace: namespace.to_string(),
        replicas,
        selector_labels,
        container_name,
        image: image.trim().to_string(),
        ports: vec![PortSpec {
            name: options
                .port_name
                .clone()
                .unwrap_or_else(|| DEFAULT_PORT_NAME.to_string()),
            protocol: options.protocol.unwrap_or_default(),
            container_port: container_port as i32,
        }],
    })
}

/// RFC 1123 label: lowercase alphanumerics and '-', starting and ending alphanumeric.
pub(crate) fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();

    !bytes.is_empty()
        && bytes.len() <= MAX_DNS_LABEL_LENGTH
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}
