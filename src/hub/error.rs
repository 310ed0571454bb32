use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to serialize sample: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("dispatcher is no longer running")]
    DispatcherClosed,
}

/// Why a frame could not be delivered to one subscriber.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("subscriber already closed")]
    Closed,
    #[error("send did not complete within {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
}
