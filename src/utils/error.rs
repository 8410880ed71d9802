use serde::Serialize;

/// Stable, serialisable classification of a `GatewayError`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthFailure,
    Unreachable,
    NotFound,
    Conflict,
    InvalidSpec,
    Upstream,
}

/// Utility enum that covers all possible errors while talking to the control plane
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// Credentials are missing, unreadable or were rejected by the control plane.
    #[error("Authentication failure: {message}")]
    AuthFailure { message: String, forbidden: bool },

    /// Transport failure or timeout while contacting the control plane.
    #[error("Control plane unreachable: {0}")]
    Unreachable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An object of the same kind and name already exists in the namespace.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rejected before (or by) the control plane because the workload definition is invalid.
    #[error("Invalid workload spec: {0}")]
    InvalidSpec(String),

    /// The control plane answered with an unexpected error status.
    #[error("Control plane reported error ({status}): {message}")]
    Upstream { status: u16, message: String },
}

impl GatewayError {
    pub fn auth(message: impl Into<String>) -> Self {
        GatewayError::AuthFailure {
            message: message.into(),
            forbidden: false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::AuthFailure { .. } => ErrorKind::AuthFailure,
            GatewayError::Unreachable(_) => ErrorKind::Unreachable,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Conflict(_) => ErrorKind::Conflict,
            GatewayError::InvalidSpec(_) => ErrorKind::InvalidSpec,
            GatewayError::Upstream { .. } => ErrorKind::Upstream,
        }
    }

    /// Human readable detail without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            GatewayError::AuthFailure { message, .. } | GatewayError::Upstream { message, .. } => {
                message
            }
            GatewayError::Unreachable(message)
            | GatewayError::NotFound(message)
            | GatewayError::Conflict(message)
            | GatewayError::InvalidSpec(message) => message,
        }
    }

    /// Only transport level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unreachable(_))
    }
}

impl From<kube::Error> for GatewayError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) => match response.code {
                401 => GatewayError::AuthFailure {
                    message: response.message,
                    forbidden: false,
                },
                403 => GatewayError::AuthFailure {
                    message: response.message,
                    forbidden: true,
                },
                404 => GatewayError::NotFound(response.message),
                409 => GatewayError::Conflict(response.message),
                400 | 422 => GatewayError::InvalidSpec(response.message),
                status => GatewayError::Upstream {
                    status,
                    message: response.message,
                },
            },
            kube::Error::Auth(err) => GatewayError::auth(err.to_string()),
            kube::Error::InferConfig(err) => GatewayError::auth(err.to_string()),
            // The request could not be built from its inputs; nothing was sent.
            kube::Error::BuildRequest(err) => GatewayError::InvalidSpec(err.to_string()),
            kube::Error::HttpError(err) => GatewayError::InvalidSpec(err.to_string()),
            kube::Error::SerdeError(err) => GatewayError::Upstream {
                status: 200,
                message: format!("malformed control plane response: {}", err),
            },
            kube::Error::FromUtf8(err) => GatewayError::Upstream {
                status: 200,
                message: format!("malformed control plane response: {}", err),
            },
            other => GatewayError::Unreachable(other.to_string()),
        }
    }
}
