use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use hub_gateway_core::HubGateway;
use hub_gateway_models::Settings;
use hub_gateway_sdk::LoopbackConnector;
use hub_gateway_web::{configure_routes, AppState};
use tracing::info;

mod listeners;
mod logger;

/// Hub Gateway - device connection multiplexer
///
/// Accepts HTTP send requests and fans them out to the messaging backend
/// over cached per-device transport sessions, with optional polling for
/// cloud-to-device messages and direct method dispatch.
#[derive(Parser)]
#[command(name = "hub-gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hub Gateway", long_about = None)]
struct Cli {
    /// Sets a custom config file with full path
    ///
    /// If not specified, the gateway looks for 'hub-gateway.toml' in the
    /// current working directory.
    #[arg(short, long, env = "HUBGW_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = logger::Logger::init(&settings.log)?;

    let connector = Arc::new(LoopbackConnector::default());
    let callbacks = listeners::debug_callbacks(&settings);
    let gateway = HubGateway::new(settings.clone(), connector, callbacks);
    gateway.init().await;

    let state = web::Data::new(AppState {
        gateway: gateway.clone(),
        settings: settings.clone(),
    });

    let host = settings.web.host.clone();
    let port = settings.web.port;
    info!(%host, port, "starting http server");

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure_routes)
    });
    if let Some(workers) = settings.web.workers {
        server = server.workers(workers);
    }
    server
        .bind((host.as_str(), port))
        .with_context(|| format!("failed to bind {host}:{port}"))?
        .run()
        .await?;

    gateway.stop().await;
    Ok(())
}
