//! One subscriber connection from handshake to deregistration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument};

use contracts::{HubConfig, OutboundMessage, SubscriberId, WireFrame};
use hub::{SubscriberHandle, SubscriberRegistry, WebSocketSink};
use race_state::RaceStateCache;

use crate::error::ServerError;

/// Shared collaborators of every session
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub registry: Arc<SubscriberRegistry>,
    pub cache: Arc<RaceStateCache>,
    pub hub: HubConfig,
    pub handshake_timeout: Duration,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    PeerClosed,
    ReadError,
    SendFailed,
    Shutdown,
}

impl SessionEnd {
    fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::ReadError => "read_error",
            Self::SendFailed => "send_failed",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Run a subscriber session to completion
#[instrument(name = "session", skip(stream, ctx, shutdown), fields(subscriber = %id, peer = %peer))]
pub(crate) async fn run_session(
    id: SubscriberId,
    stream: TcpStream,
    peer: SocketAddr,
    ctx: SessionContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let ws = tokio::time::timeout(
        ctx.handshake_timeout,
        tokio_tungstenite::accept_async(stream),
    )
    .await
    .map_err(|_| ServerError::HandshakeTimeout)??;

    let (write, mut read) = ws.split();
    let sink = WebSocketSink::new(format!("ws-{peer}"), write);
    let handle = Arc::new(SubscriberHandle::spawn(
        id,
        sink,
        ctx.hub.subscriber_queue_capacity,
        ctx.hub.send_timeout(),
    ));

    // Snapshot and enqueue init before any broadcast can reach the handle
    let cache = Arc::clone(&ctx.cache);
    let init = ctx
        .registry
        .add_with(Arc::clone(&handle), |handle| async move {
            let snapshot = cache.snapshot().await;
            debug!(entities = snapshot.entity_count(), "Sending init snapshot");
            let frame = WireFrame::encode(&OutboundMessage::Init(snapshot))?;
            Ok::<_, hub::HubError>(handle.enqueue(frame))
        })
        .await;

    let init = match init {
        Ok(init) => init,
        Err(e) => {
            handle.shutdown().await;
            return Err(e.into());
        }
    };

    let outcome = init.outcome().await;
    if !outcome.is_delivered() {
        ctx.registry.remove(id).await;
        handle.shutdown().await;
        return Err(ServerError::InitUndelivered(outcome.label()));
    }
    info!("Subscriber connected");

    let end = tokio::select! {
        _ = handle.closed() => SessionEnd::SendFailed,
        _ = wait_shutdown(&mut shutdown) => SessionEnd::Shutdown,
        end = drain_inbound(&mut read) => end,
    };

    ctx.registry.remove(id).await;
    handle.shutdown().await;
    info!(reason = end.as_str(), "Subscriber disconnected");
    Ok(())
}

/// Read and discard inbound frames until the peer goes away
async fn drain_inbound<S>(read: &mut S) -> SessionEnd
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Close(_)) => return SessionEnd::PeerClosed,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Read failed");
                return SessionEnd::ReadError;
            }
        }
    }
    SessionEnd::PeerClosed
}

pub(crate) async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop || rx.changed().await.is_err() {
            return;
        }
    }
}
