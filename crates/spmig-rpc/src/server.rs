//! RPC server lifecycle.
//!
//! Binds the listener up front so address errors reach the caller, then
//! serves the registry's routes on a background task until [`RpcServer::stop`]
//! drains it.

use std::net::SocketAddr;

use spmig_core::ServerConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info, warn};

use crate::registry::ServiceRegistry;

/// Errors from starting or stopping the RPC server.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to listen on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("no service roles registered")]
    NoServices,

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Task(String),

    #[error("reflection service: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),
}

/// A running gRPC server.
#[derive(Debug)]
pub struct RpcServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    config: ServerConfig,
}

impl RpcServer {
    /// Bind `config.address` and start serving `registry` in the background.
    pub async fn start(config: &ServerConfig, registry: ServiceRegistry) -> Result<Self, RpcError> {
        if registry.is_empty() {
            return Err(RpcError::NoServices);
        }
        let roles = registry.names();

        let listener = TcpListener::bind(config.address.as_str())
            .await
            .map_err(|source| {
                error!(address = %config.address, error = %source, "failed to listen tcp address");
                RpcError::Bind {
                    address: config.address.clone(),
                    source,
                }
            })?;
        let local_addr = listener.local_addr()?;

        let routes = registry.into_routes(config)?;
        let mut builder = Server::builder()
            .http2_keepalive_interval(Some(config.keepalive_interval()))
            .http2_keepalive_timeout(Some(config.keepalive_timeout()))
            .max_connection_age(config.max_connection_age());
        let router = builder.add_routes(routes);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let incoming = TcpListenerStream::new(listener);
            let signal = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = router.serve_with_incoming_shutdown(incoming, signal).await {
                error!(error = %e, "gRPC server error");
            }
        });

        info!(
            %local_addr,
            ?roles,
            max_message_size = config.max_message_size,
            keepalive_interval = ?config.keepalive_interval(),
            keepalive_timeout = ?config.keepalive_timeout(),
            max_connection_age = ?config.max_connection_age(),
            max_connection_age_grace = ?config.max_connection_age_grace(),
            idle_timeout = ?config.idle_timeout(),
            min_ping_interval = ?config.min_ping_interval(),
            "gRPC server started"
        );

        Ok(Self {
            local_addr,
            shutdown,
            handle,
            config: config.clone(),
        })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting calls and wait for in-flight calls to finish. Calls
    /// still running after the grace period are dropped.
    pub async fn stop(self) -> Result<(), RpcError> {
        let Self {
            local_addr,
            shutdown,
            mut handle,
            config,
        } = self;
        let _ = shutdown.send(());

        let grace = config.max_connection_age_grace();
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => {
                info!(%local_addr, "gRPC server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(RpcError::Task(e.to_string())),
            Err(_) => {
                warn!(%local_addr, ?grace, "gRPC drain exceeded grace period, aborting");
                handle.abort();
                Ok(())
            }
        }
    }
}
