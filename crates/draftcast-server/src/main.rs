// draftcast entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Build the Sleeper client
// 4. Load ADP (optional) and build the player catalog
// 5. Spawn the session registry
// 6. Bind and spawn the WebSocket server
// 7. Wait for Ctrl+C or a server failure
// 8. Cleanup on exit

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use draftcast_core::catalog::{self, Catalog};
use draftcast_core::registry;
use draftcast_server::config;
use draftcast_server::ws_server;
use draftcast_sleeper::SleeperClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("draftcast starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: listen={}, {} teams per league, poll every {}ms",
        config.listen_addr(),
        config.draft.teams_per_league,
        config.draft.poll_interval_ms
    );

    // 3. Build the Sleeper client
    let sleeper = Arc::new(SleeperClient::new(
        config.sleeper.base_url.clone(),
        config.sleeper.sport.clone(),
    ));

    // 4. Load ADP and build the catalog. Both failures are fatal: nothing is
    //    served without a catalog.
    let adp = match &config.catalog.adp_path {
        Some(path) => catalog::load_adp(path)
            .with_context(|| format!("failed to load ADP from {}", path.display()))?,
        None => {
            info!("No ADP file configured; every player is unranked");
            Default::default()
        }
    };
    let catalog = Catalog::build(sleeper.as_ref(), &adp)
        .await
        .context("failed to build player catalog")?;
    info!("Catalog ready with {} players", catalog.len());

    // 5. Spawn the session registry
    let (registry, registry_task) =
        registry::spawn(Arc::new(catalog), sleeper.clone(), config.tracker_config());

    // 6. Bind and spawn the WebSocket server
    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket server on {listen_addr}"))?;
    let mut ws_handle = tokio::spawn(ws_server::run(listener, registry, sleeper));

    // 7. Run until Ctrl+C or the server stops on its own
    info!("Application ready. WebSocket server listening on {listen_addr}");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Ctrl+C received, shutting down");
        }
        result = &mut ws_handle => {
            match result {
                Ok(Ok(())) => info!("WebSocket server stopped"),
                Ok(Err(e)) => error!("WebSocket server error: {e:#}"),
                Err(e) => error!("WebSocket server task failed: {e}"),
            }
        }
    }

    // 8. Cleanup: the registry stops every tracker once the last handle is
    //    dropped. Open connections may still hold one, so don't wait forever.
    ws_handle.abort();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), registry_task).await;

    info!("draftcast shut down cleanly");
    Ok(())
}

/// Initialize tracing to stdout, filtered by `RUST_LOG`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draftcast=info,warn")),
        )
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
