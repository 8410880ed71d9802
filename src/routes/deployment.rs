use actix_web::web::{Data, Json, Query};
use actix_web::{get, post, HttpResponse};
use serde::Serialize;

use crate::models::deployment::{DeploymentQuery, DeploymentRequest, Provisioned};
use crate::utils::error::GatewayError;
use crate::workflows::gateway::Gateway;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyExistsResponse {
    name: String,
    namespace: String,
    already_exists: bool,
    warning: String,
}

/// Ensures a deployment exists, parameters taken from the query string.
#[get("/deployment")]
pub async fn ensure_deployment_query(
    gateway: Data<Gateway>,
    query: Query<DeploymentQuery>,
) -> Result<HttpResponse, GatewayError> {
    let provisioned = gateway
        .ensure_deployment(DeploymentRequest::from(query.into_inner()))
        .await?;

    Ok(respond(provisioned))
}

/// Ensures a deployment exists, parameters taken from a JSON body.
#[post("/deployment")]
pub async fn ensure_deployment_json(
    gateway: Data<Gateway>,
    request: Json<DeploymentRequest>,
) -> Result<HttpResponse, GatewayError> {
    let provisioned = gateway.ensure_deployment(request.into_inner()).await?;

    Ok(respond(provisioned))
}

fn respond(provisioned: Provisioned) -> HttpResponse {
    match provisioned {
        Provisioned::Created(metadata) => HttpResponse::Created().json(metadata),
        Provisioned::AlreadyExists {
            name,
            namespace,
            warning,
        } => HttpResponse::Ok().json(AlreadyExistsResponse {
            name,
            namespace,
            already_exists: true,
            warning,
        }),
    }
}
