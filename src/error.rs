use std::io;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    UdpBind { addr: String, source: io::Error },
    #[error("failed to bind WebSocket listener on {addr}: {source}")]
    WebSocketBind { addr: String, source: io::Error },
    #[error("WebSocket server error: {0}")]
    Serve(#[source] io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
