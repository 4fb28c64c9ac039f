mod auth;
mod connection;
mod prepared_response;
mod resultset;
mod sql;
mod state;

use std::sync::Arc;

use clap::Parser;
use common::err::{CResult, ReError};
use common::log::TracingFactory;
use common::server::{Server, ShutdownHandle};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "sqlsrv", about = "MySQL-wire-compatible SQL server with pluggable storage backends")]
struct Cli {
    /// Path to a TOML config file. Falls back to built-in defaults when absent.
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long)]
    debug: bool,
}

/// Shared accept-loop state. Kept behind an `Arc` so the handle that runs
/// `start()` in a spawned task and the handle `ShutdownHandle` holds for
/// `shutdown()` are two `TcpServer` values referring to the same listener
/// lifecycle rather than requiring one object to outlive both roles.
struct Inner {
    bind_addr: String,
    state: Arc<AppState>,
    stop: Notify,
    handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

#[derive(Clone)]
struct TcpServer {
    inner: Arc<Inner>,
}

impl TcpServer {
    fn new(bind_addr: String, state: Arc<AppState>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bind_addr,
                state,
                stop: Notify::new(),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Server for TcpServer {
    async fn start(&mut self) -> Result<(), ReError> {
        let inner = &self.inner;
        let listener = TcpListener::bind(&inner.bind_addr)
            .await
            .map_err(|e| ReError::ConnectionError(format!("bind {}: {e}", inner.bind_addr)))?;
        info!(addr = %inner.bind_addr, "listening");

        loop {
            tokio::select! {
                _ = inner.stop.notified() => {
                    info!("stop requested, no longer accepting new connections");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = accepted.map_err(|e| ReError::ConnectionError(e.to_string()))?;
                    let state = inner.state.clone();
                    let peer = peer_addr.to_string();
                    let handle = tokio::spawn(async move {
                        if let Err(err) = connection::handle(stream, peer.clone(), state).await {
                            error!(peer = %peer, error = %err, "connection ended with an error");
                        }
                    });
                    inner.handles.lock().await.push(handle);
                }
            }
        }
    }

    async fn shutdown(&mut self, graceful: bool) -> Result<(), ReError> {
        self.inner.stop.notify_waiters();
        let mut handles = self.inner.handles.lock().await;
        if graceful {
            for handle in handles.drain(..) {
                if let Err(err) = handle.await {
                    warn!(error = %err, "connection task panicked during shutdown");
                }
            }
        } else {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> CResult<()> {
    let cli = Cli::parse();
    TracingFactory::init_log(cli.debug);

    let config = match &cli.config {
        Some(path) => common::config::ServerConfig::load(path)?,
        None => common::config::ServerConfig::default(),
    };

    let bind_addr = format!("{}:{}", config.bind_addr, config.port);
    let state = AppState::bootstrap(config).await?;

    let server = TcpServer::new(bind_addr, state);
    let mut accept_loop = server.clone();
    tokio::spawn(async move {
        if let Err(err) = accept_loop.start().await {
            error!(error = %err, "accept loop exited with an error");
        }
    });

    let mut shutdown_handle = ShutdownHandle::create();
    shutdown_handle.add_service(Box::new(server));

    tokio::signal::ctrl_c().await.map_err(ReError::IoError)?;
    info!("received shutdown signal");
    shutdown_handle.shutdown_services(true).await?;
    Ok(())
}
