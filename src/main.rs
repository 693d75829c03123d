//! Swapper daemon: background workers plus the REST API on one tokio runtime.
//!
//! ```bash
//! export PROXMOX_URL=https://pve.local:8006
//! export PROXMOX_TOKEN_ID='root@pam!swapper'
//! export PROXMOX_TOKEN_SECRET=...
//! leeca-swapper --kv-uri redb:///var/lib/leeca-swapper/cache.redb
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use leeca_swapper::{
    SwapperContext, SwapperRuntime,
    api::{self, AppState},
    config::Settings,
    open_store,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment and flags still apply.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("leeca_swapper=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::parse();
    let options = settings.options().context("invalid swapper options")?;
    let hypervisor = settings
        .hypervisor()
        .context("invalid Proxmox connection settings")?;
    let kv = open_store(&settings.kv_uri)
        .await
        .with_context(|| format!("failed to open cache store {}", settings.kv_uri))?;

    if options.api_token.is_none() {
        info!("no API token configured, serving localhost only");
    }
    if options.power_halt {
        info!("forced halt is enabled");
    }

    let ctx = SwapperContext::new(Arc::new(hypervisor), kv, options);
    let runtime = SwapperRuntime::start(ctx.clone());
    let app = api::router(AppState::new(ctx, runtime.queues().clone()));

    let listener = tokio::net::TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen))?;
    info!("listening on http://{}", settings.listen);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("REST API server error")?;

    runtime.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
