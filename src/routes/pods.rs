use actix_web::web::{Data, Json};
use actix_web::{get, Responder};

use crate::utils::error::GatewayError;
use crate::workflows::gateway::Gateway;

/// Lists the pods of the configured namespace as a JSON array.
#[get("/pods")]
pub async fn list_pods(gateway: Data<Gateway>) -> Result<impl Responder, GatewayError> {
    let pods = gateway.list_pods().await?;

    Ok(Json(pods))
}
