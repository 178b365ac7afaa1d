pub mod api;
pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod handler;
pub mod mapper;
pub mod metrics_defs;
mod service;
#[cfg(test)]
mod testutils;

use backend::HttpControlPlane;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

pub use errors::UserplaneError;
pub use service::UserplaneService;

pub async fn run(config: config::Config) -> errors::Result<()> {
    let control_plane = Arc::new(HttpControlPlane::from_config(&config)?);
    let dispatcher =
        api::userplanes_dispatcher(&config.base_uri, control_plane, config.tac_encoding);
    for (method, path, handler) in dispatcher.routes() {
        tracing::info!(method = %method, path = %path, handler = handler, "Registered route");
    }

    let gateway_service = UserplaneService::new(dispatcher);
    let admin_service: AdminService<_, UserplaneError> = AdminService::new(|| true);

    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        gateway_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}
