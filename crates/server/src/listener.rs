//! Relay listener
//!
//! Handles the TCP accept loop and spawns one session per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use contracts::{RelayConfig, SubscriberId};
use hub::SubscriberRegistry;
use race_state::RaceStateCache;

use crate::error::ServerError;
use crate::session::{run_session, wait_shutdown, SessionContext};

/// Subscriber-facing WebSocket server
pub struct RelayServer {
    listener: TcpListener,
    ctx: SessionContext,
    next_subscriber_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Bind the listening socket
    #[instrument(name = "relay_server_bind", skip_all, fields(addr = %config.server.bind_addr))]
    pub async fn bind(
        config: &RelayConfig,
        registry: Arc<SubscriberRegistry>,
        cache: Arc<RaceStateCache>,
    ) -> Result<Self, ServerError> {
        let addr = config.server.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let connection_semaphore = if config.server.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.server.max_connections)))
        } else {
            None
        };

        Ok(Self {
            listener,
            ctx: SessionContext {
                registry,
                cache,
                hub: config.hub.clone(),
                handshake_timeout: config.server.handshake_timeout(),
            },
            next_subscriber_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` turns true
    ///
    /// Open sessions observe the same signal; this returns after they have
    /// all deregistered.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        info!(addr = %self.local_addr()?, "Relay server listening");
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = wait_shutdown(&mut shutdown) => {
                    info!("Shutdown signal received");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        self.handle_connection(&mut sessions, socket, peer, shutdown.clone());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                // Reap finished sessions
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        while sessions.join_next().await.is_some() {}
        info!("Relay server stopped");
        Ok(())
    }

    fn handle_connection(
        &self,
        sessions: &mut JoinSet<()>,
        socket: TcpStream,
        peer: SocketAddr,
        shutdown: watch::Receiver<bool>,
    ) {
        // Check connection limit
        let permit = match &self.connection_semaphore {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(peer = %peer, "Connection rejected: limit reached");
                    observability::metrics::record_connection_rejected();
                    return;
                }
            },
            None => None,
        };

        if let Err(e) = socket.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        debug!(subscriber = %id, peer = %peer, "New connection");

        let ctx = self.ctx.clone();
        sessions.spawn(async move {
            let _permit = permit;
            if let Err(e) = run_session(id, socket, peer, ctx, shutdown).await {
                warn!(subscriber = %id, peer = %peer, error = %e, "Session ended with error");
            }
        });
    }
}
