use crate::cli::ServeOpts;
use crate::config::Config;
use crate::gateway::routes;
use crate::reconcile::Dispatcher;

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
    pub token: Option<Arc<str>>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub start_time: std::time::Instant,
    pub version: String,
}

impl GatewayState {
    pub fn new(dispatcher: Arc<Dispatcher>, token: Option<String>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            dispatcher,
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
            shutdown_tx,
            start_time: std::time::Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// HTTP front end delivering lifecycle events to the dispatcher.
pub struct GatewayServer {
    state: GatewayState,
    listener: TcpListener,
    addr: SocketAddr,
    shutdown_rx: broadcast::Receiver<()>,
}

impl GatewayServer {
    /// Bind the listener. Port `0` picks an ephemeral port; see [`addr`](Self::addr).
    pub async fn start(config: &Config, opts: &ServeOpts, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let port = opts.port.unwrap_or(config.gateway.port);
        let bind_addr = resolve_bind_address(&config.gateway.bind, opts.bind.as_deref(), port)?;

        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind gateway to {bind_addr}"))?;
        let addr = listener.local_addr()?;

        let state = GatewayState::new(dispatcher, config.gateway.token.clone());
        let shutdown_rx = state.shutdown_tx.subscribe();
        info!("Gateway server bound to {}", addr);

        Ok(Self {
            state,
            listener,
            addr,
            shutdown_rx,
        })
    }

    /// Run the server until a signal or [`shutdown`](Self::shutdown) stops it.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let app = build_router(self.state.clone());

        print_startup_banner(&self.state, &self.addr);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal(self.state.shutdown_tx.clone(), self.shutdown_rx))
            .await?;

        info!("Gateway server shut down gracefully");
        Ok(())
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sender that stops a running server when fired.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.state.shutdown_tx.clone()
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.state.shutdown_tx.send(());
    }
}

/// Build the Axum router with all routes.
fn build_router(state: GatewayState) -> Router {
    routes::build_routes(state)
}

/// Wait for Ctrl+C, SIGTERM, or an explicit shutdown message.
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>, mut shutdown_rx: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown requested");
        }
    }

    let _ = shutdown_tx.send(());
}

/// Resolve the bind address from configuration and CLI override.
fn resolve_bind_address(configured: &str, bind_override: Option<&str>, port: u16) -> Result<SocketAddr> {
    let host = bind_override.unwrap_or(configured);
    let ip: std::net::IpAddr = host
        .parse()
        .with_context(|| format!("Invalid bind address '{host}'"))?;
    Ok(SocketAddr::new(ip, port))
}

/// Print startup banner with server info.
fn print_startup_banner(state: &GatewayState, addr: &SocketAddr) {
    let auth_mode = if state.token.is_some() { "bearer token" } else { "none" };

    info!("-------------------------------------------");
    info!("  Resource reconciler gateway v{}", state.version);
    info!("  Listening on: http://{}", addr);
    info!("  Auth mode: {}", auth_mode);
    info!("  Events: POST http://{}/events", addr);
    info!("  Health: http://{}/health", addr);
    info!("-------------------------------------------");
}
