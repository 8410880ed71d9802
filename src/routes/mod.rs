use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Serialize;

use crate::utils::error::{ErrorKind, GatewayError};

pub mod deployment;
pub mod health_check;
pub mod pods;

/// Structured error body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&GatewayError> for ErrorMessage {
    fn from(error: &GatewayError) -> Self {
        ErrorMessage {
            kind: error.kind(),
            message: error.message().to_string(),
            retryable: error.is_retryable(),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthFailure {
                forbidden: true, ..
            } => StatusCode::FORBIDDEN,
            GatewayError::AuthFailure { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::InvalidSpec(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorMessage::from(self))
    }
}

/// Registers every gateway route. Unparseable query strings and bodies are
/// reported as `InvalidSpec` so every failure shares the same error body.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _request| {
        GatewayError::InvalidSpec(err.to_string()).into()
    }))
    .app_data(web::JsonConfig::default().error_handler(|err, _request| {
        GatewayError::InvalidSpec(err.to_string()).into()
    }))
    .service(health_check::health_check)
    .service(health_check::hello)
    .service(pods::list_pods)
    .service(deployment::ensure_deployment_query)
    .service(deployment::ensure_deployment_json);
}
