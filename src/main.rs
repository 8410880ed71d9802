use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use log::{info, warn};

mod configuration;
mod controllers;
mod credentials;
mod models;
mod routes;
mod utils;
mod workflows;

use configuration::load_config;
use controllers::KubeControlPlane;
use credentials::{CredentialCache, InClusterResolver};
use workflows::gateway::Gateway;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    info!("gateway settings:\n{}", config);

    // Credentials come from the service account mounted into this pod. They are
    // resolved once here to surface misconfiguration early, and re-read whenever
    // they expire or are rejected. A failure is not fatal: requests report
    // AuthFailure until the identity material shows up.
    let resolver = InClusterResolver::from_env(config.token_refresh());
    let credentials = CredentialCache::new(Arc::new(resolver));
    if let Err(err) = credentials.get().await {
        warn!("no control plane credentials yet: {}", err);
    }

    let control_plane = KubeControlPlane::new(credentials, config.request_timeout());
    let gateway = Data::new(Gateway::new(Arc::new(control_plane), config.clone()));

    info!("listening on {}", config.listen_address);

    // Failing to bind the listener is the only fatal runtime condition.
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(gateway.clone())
            .configure(routes::configure)
    })
    .bind(config.listen_address.as_str())?
    .run()
    .await?;

    Ok(())
}
