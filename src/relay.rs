use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::RelayError;
use crate::hub::{self, Hub};
use crate::telemetry::{MotionModel, TelemetrySample};
use crate::tick::TickSource;
use crate::web::Acceptor;

/// UDP tick source, broadcast hub and WebSocket acceptor wired together.
///
/// Both sockets are bound by [`Relay::bind`], so bind failures surface
/// before anything is spawned.
pub struct Relay {
    hub: Arc<Hub>,
    tick: TickSource,
    acceptor: Acceptor,
    samples: mpsc::Receiver<TelemetrySample>,
}

impl Relay {
    pub async fn bind(config: &Config) -> Result<Self, RelayError> {
        let hub = Arc::new(Hub::new(config.hub.send_timeout));
        let (tx, samples) = hub::channel(hub.clone(), config.hub.queue_capacity);

        let model = MotionModel::new(config.motion.clone());
        let tick = TickSource::bind(&config.udp.bind, model, tx).await?;
        let acceptor = Acceptor::bind(&config.web.bind, hub.clone()).await?;

        Ok(Self {
            hub,
            tick,
            acceptor,
            samples,
        })
    }

    pub fn udp_addr(&self) -> io::Result<SocketAddr> {
        self.tick.local_addr()
    }

    pub fn ws_addr(&self) -> io::Result<SocketAddr> {
        self.acceptor.local_addr()
    }

    pub fn hub(&self) -> Arc<Hub> {
        self.hub.clone()
    }

    /// Run until the WebSocket server stops.
    pub async fn run(self) -> Result<(), RelayError> {
        if let Ok(addr) = self.udp_addr() {
            log::info!("UDP listener waiting on {}", addr);
        }
        if let Ok(addr) = self.ws_addr() {
            log::info!("WebSocket server listening on {}", addr);
        }

        tokio::spawn(hub::run_dispatcher(self.hub.clone(), self.samples));
        tokio::spawn(self.tick.run());
        self.acceptor.serve().await
    }
}
