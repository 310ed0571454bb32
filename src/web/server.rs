use axum::{routing::any, Router};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::RelayError;
use crate::hub::Hub;

use super::handlers::{self, AppState};

/// HTTP listener that upgrades every request path to a telemetry stream.
pub struct Acceptor {
    listener: TcpListener,
    hub: Arc<Hub>,
}

impl Acceptor {
    pub async fn bind(addr: &str, hub: Arc<Hub>) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::WebSocketBind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { listener, hub })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve(self) -> Result<(), RelayError> {
        let app = router(self.hub);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(RelayError::Serve)
    }
}

fn router(hub: Arc<Hub>) -> Router {
    let state = AppState { hub };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", any(handlers::status))
        .fallback(handlers::connect)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
