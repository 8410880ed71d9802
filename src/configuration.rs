use std::fmt;
use std::time::Duration;

use config::{ConfigError, Environment};
use serde::Deserialize;

use crate::utils::retry::RetryConfig;
use crate::workflows::spec_builder::is_dns_label;

/// Prefix for environment variable configuration.
///
/// Nested keys use double underscores: `GATEWAY_RETRY__MAX_ATTEMPTS` sets `retry.max_attempts`.
const ENV_PREFIX: &str = "GATEWAY";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_SEPARATOR: &str = "__";

/// Gateway settings, loaded from `GATEWAY_*` environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Namespace listed by `GET /pods`.
    pub namespace: String,
    /// Namespace used by `/deployment` when the request names none.
    pub deployment_namespace: String,
    /// Report an existing deployment as success instead of 409.
    pub idempotent_create: bool,
    /// Bound on each call to the control plane.
    pub request_timeout_ms: u64,
    pub listen_address: String,
    pub retry: RetryConfig,
    pub credentials: CredentialSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialSettings {
    /// Seconds a service account token is trusted before it is read again.
    pub token_refresh_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            namespace: "default".to_string(),
            deployment_namespace: "customer-x".to_string(),
            idempotent_create: false,
            request_timeout_ms: 5_000,
            listen_address: "0.0.0.0:8080".to_string(),
            retry: RetryConfig::default(),
            credentials: CredentialSettings::default(),
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        CredentialSettings {
            token_refresh_secs: 60,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn token_refresh(&self) -> Duration {
        Duration::from_secs(self.credentials.token_refresh_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Message(message.to_string()));

        if !is_dns_label(&self.namespace) {
            return invalid("namespace must be a DNS label");
        }
        if !is_dns_label(&self.deployment_namespace) {
            return invalid("deployment_namespace must be a DNS label");
        }
        if self.request_timeout_ms == 0 {
            return invalid("request_timeout_ms must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.retry.backoff_factor < 1.0 {
            return invalid("retry.backoff_factor must be at least 1.0");
        }
        if self.credentials.token_refresh_secs == 0 {
            return invalid("credentials.token_refresh_secs must be greater than 0");
        }

        Ok(())
    }
}

impl fmt::Display for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    namespace: {}", self.namespace)?;
        writeln!(f, "    deployment_namespace: {}", self.deployment_namespace)?;
        writeln!(f, "    idempotent_create: {}", self.idempotent_create)?;
        writeln!(f, "    request_timeout_ms: {}", self.request_timeout_ms)?;
        writeln!(f, "    listen_address: {}", self.listen_address)?;
        write!(f, "    retry.max_attempts: {}", self.retry.max_attempts)
    }
}

/// Loads the configuration from the process environment.
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    load_config_from(None)
}

/// Loads the configuration from `source` instead of the process environment when given.
fn load_config_from(
    source: Option<config::Map<String, String>>,
) -> Result<GatewayConfig, ConfigError> {
    let environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .source(source);

    let config = config::Config::builder()
        .add_source(environment)
        .build()?
        .try_deserialize::<GatewayConfig>()?;

    config.validate()?;

    Ok(config)
}
