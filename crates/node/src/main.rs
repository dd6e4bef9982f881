use std::{net::SocketAddr, sync::Arc, time::Duration};

use ledger::Ledger;
use tracing::info;

mod api;
mod app_state;
mod config;
mod deploy;

use app_state::AppState;
use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let ledger = Ledger::new();
    deploy::deploy_demo_contracts(&ledger, &settings).await?;
    let _sealer = ledger.spawn_sealer(Duration::from_millis(settings.seal_latency_ms));

    let state = AppState { ledger };
    let app = api::build_router(Arc::new(state));

    let addr: SocketAddr = settings.node_bind.parse()?;
    info!(%addr, seal_latency_ms = settings.seal_latency_ms, "node listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod api_tests;
#[cfg(test)]
#[path = "tests/e2e_tests.rs"]
mod e2e_tests;
