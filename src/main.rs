#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! sPin peer node entrypoint (systemd-friendly). Starts the HTTP request
//! surface and the three background loops (registry advertise, registry
//! poll + gossip broadcast, replication maintenance), and keeps the
//! process alive until SIGINT/SIGTERM.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use spin_peer::config::Config;
use spin_peer::networking::{gossip, registry_client};
use spin_peer::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config = Config::from_env();
    info!(data_dir = %config.data_dir, bind_addr = %config.bind_addr, "sPin node starting");

    let state = match AppState::open(config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            eprintln!("startup failed: {e:#}");
            std::process::exit(1);
        }
    };
    info!(name = %state.self_name, "peer identity established");

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    let bound_addr = listener.local_addr()?;
    info!(addr = %bound_addr, "listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let advertise_task = tokio::spawn(advertise_loop(state.clone(), bound_addr.port(), shutdown_rx.clone()));
    let poll_task = tokio::spawn(poll_and_gossip_loop(state.clone(), shutdown_rx.clone()));
    let maintain_task = tokio::spawn(maintain_loop(state.clone(), shutdown_rx.clone()));

    let app = spin_peer::server::router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop accepting new requests, then cancel the background loops and let
    // in-flight handlers (already drained above) finish.
    let _ = shutdown_tx.send(());
    let _ = tokio::join!(advertise_task, poll_task, maintain_task);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

/// Periodic UDP self-advertisement to the registry.
async fn advertise_loop(state: Arc<AppState>, advertise_port: u16, mut shutdown: watch::Receiver<()>) {
    let advertise_port = if state.config.advertise_addr.is_empty() {
        advertise_port
    } else {
        state
            .config
            .advertise_addr
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .filter(|&p| p != 0)
            .unwrap_or(advertise_port)
    };

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(state.config.nameserver_wait) => {
                let result = registry_client::advertise(
                    &state.config.nameserver_host,
                    state.config.nameserver_port,
                    &state.config.nameserver_type,
                    &state.config.nameserver_owner,
                    advertise_port,
                    &state.self_name,
                )
                .await;
                if let Err(e) = result {
                    warn!(error = %e, "registry advertisement failed");
                }
            }
        }
    }
}

/// Periodic registry poll, publishing the peer table and triggering one
/// gossip broadcast per successful poll.
async fn poll_and_gossip_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<()>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(state.config.nameserver_wait) => {
                match registry_client::poll(
                    &state.http,
                    &state.config.nameserver_host,
                    state.config.nameserver_port,
                    &state.config.nameserver_type,
                    &state.self_name,
                    state.config.nameserver_staleness,
                    state.config.gossip_timeout,
                )
                .await
                {
                    Ok(peers) => {
                        state.metrics.peers_known.set(peers.len() as i64);
                        state.peers.replace(peers).await;
                        gossip::broadcast(&state).await;
                    }
                    Err(e) => warn!(error = %e, "registry poll failed"),
                }
            }
        }
    }
}

/// The replication controller's periodic maintenance tick,
/// started after an initial delay so the worldview and peer table have a
/// chance to populate.
async fn maintain_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<()>) {
    tokio::select! {
        _ = shutdown.changed() => return,
        _ = tokio::time::sleep(state.config.nameserver_wait) => {}
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(state.config.maintain_interval) => {
                spin_peer::core::replication::tick(&state).await;
            }
        }
    }
}
