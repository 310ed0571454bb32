//! In-memory stand-in for the write half of a WebSocket.

use axum::extract::ws::Message;
use futures_util::Sink;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Accept,
    /// Every write fails as if the peer reset the connection.
    Fail,
    /// Never ready to accept a frame, flush or close, like a peer whose
    /// socket buffer is full.
    Stall,
}

#[derive(Default)]
pub struct Probe {
    frames: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl Probe {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Wait for closes that were handed off to a background task.
    pub async fn wait_for_closes(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.closes() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("sink was not closed");
    }
}

type SendHook = Box<dyn Fn() + Send + Sync>;

pub struct TestSink {
    behavior: Behavior,
    probe: Arc<Probe>,
    on_send: Option<SendHook>,
}

impl TestSink {
    pub fn new(behavior: Behavior) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let sink = Self {
            behavior,
            probe: probe.clone(),
            on_send: None,
        };
        (sink, probe)
    }

    /// Run `hook` every time a frame is handed to the sink.
    pub fn on_send(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_send = Some(Box::new(hook));
        self
    }
}

impl Sink<Message> for TestSink {
    type Error = axum::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.behavior {
            Behavior::Stall => Poll::Pending,
            _ => Poll::Ready(Ok(())),
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        if let Some(hook) = &self.on_send {
            hook();
        }
        match self.behavior {
            Behavior::Fail => Err(axum::Error::new(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer gone",
            ))),
            _ => {
                if let Message::Text(text) = item {
                    self.probe.frames.lock().unwrap().push(text.as_str().to_owned());
                }
                Ok(())
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.behavior {
            Behavior::Stall => Poll::Pending,
            _ => Poll::Ready(Ok(())),
        }
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Stall => Poll::Pending,
            _ => Poll::Ready(Ok(())),
        }
    }
}
