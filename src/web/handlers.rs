use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::hub::{Hub, SubscriberHandle};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
}

/// Fallback for every path: upgrade to a telemetry stream.
pub async fn connect(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept(ws, state, peer),
        Err(rejection) => {
            log::warn!("Rejected WebSocket upgrade from {}: {}", peer, rejection);
            rejection.into_response()
        }
    }
}

/// Relay status as JSON, or a telemetry stream when the request asks to
/// upgrade.
pub async fn status(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept(ws, state, peer),
        Err(_) => Json(state.hub.status()).into_response(),
    }
}

fn accept(ws: WebSocketUpgrade, state: AppState, peer: SocketAddr) -> Response {
    ws.on_failed_upgrade(move |e| {
        log::warn!("WebSocket upgrade from {} failed: {}", peer, e);
    })
    .on_upgrade(move |socket| peer_session(socket, state.hub, peer))
}

/// Register the peer, then read (and discard) until it goes away or the
/// hub closes it.
async fn peer_session(socket: WebSocket, hub: Arc<Hub>, peer: SocketAddr) {
    let (sink, mut stream) = socket.split();
    let handle = Arc::new(SubscriberHandle::new(Some(peer), sink));
    let id = handle.id();

    hub.register(handle.clone());
    log::info!("Subscriber {} connected from {} ({} live)", id, peer, hub.len());

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::debug!("Subscriber {} read error: {}", id, e);
                    break;
                }
            },
            _ = handle.closed() => break,
        }
    }

    hub.unregister(id).await;
    log::info!("Subscriber {} disconnected ({} live)", id, hub.len());
}
