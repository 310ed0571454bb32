use axum::extract::ws::{Message, Utf8Bytes};
use chrono::{DateTime, Utc};
use futures_util::{Sink, SinkExt};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use uuid::Uuid;

use super::error::SendError;

pub type SubscriberId = Uuid;

type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Write side of one connected WebSocket peer.
///
/// The handle is shared between the hub (which writes frames) and the
/// peer's read loop (which watches for disconnection). Whichever side
/// notices a failure first closes it; [`SubscriberHandle::close`] only
/// acts on the first call.
pub struct SubscriberHandle {
    id: SubscriberId,
    peer: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    sink: Mutex<Option<FrameSink>>,
    closed: watch::Sender<bool>,
}

impl SubscriberHandle {
    pub fn new<S>(peer: Option<SocketAddr>, sink: S) -> Self
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        let (closed, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            peer,
            connected_at: Utc::now(),
            sink: Mutex::new(Some(Box::pin(sink))),
            closed,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the handle has been closed by anyone.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Write one text frame, giving up after `deadline`.
    pub async fn send_text(&self, text: Utf8Bytes, deadline: Duration) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }

        let send = async {
            let mut guard = self.sink.lock().await;
            // Re-check under the per-handle lock: a close may have won the race.
            let sink = match guard.as_mut() {
                Some(sink) if !self.is_closed() => sink,
                _ => return Err(SendError::Closed),
            };
            sink.send(Message::Text(text)).await?;
            Ok(())
        };

        match timeout(deadline, send).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(deadline)),
        }
    }

    /// Close the peer. Returns `false` if the handle was already closed.
    ///
    /// The close handshake is best effort and bounded by `deadline`.
    pub async fn close(&self, deadline: Duration) -> bool {
        if !self.mark_closed() {
            return false;
        }
        self.shutdown(deadline).await;
        true
    }

    /// Like [`SubscriberHandle::close`], but the handshake runs on its own
    /// task. The handle counts as closed as soon as this returns.
    pub fn close_detached(self: &Arc<Self>, deadline: Duration) -> bool {
        if !self.mark_closed() {
            return false;
        }
        let handle = self.clone();
        tokio::spawn(async move { handle.shutdown(deadline).await });
        true
    }

    fn mark_closed(&self) -> bool {
        self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Take the sink out of the handle and close it. A peer that does not
    /// accept the close frame in time has its sink dropped instead.
    async fn shutdown(&self, deadline: Duration) {
        let sink = self.sink.lock().await.take();
        let Some(mut sink) = sink else {
            return;
        };
        match timeout(deadline, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("Subscriber {} close error: {}", self.id, e),
            Err(_) => log::debug!("Subscriber {} close timed out", self.id),
        }
    }
}
