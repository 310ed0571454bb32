use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use crate::error::RelayError;
use crate::hub::SampleSender;
use crate::telemetry::MotionModel;

/// Largest UDP payload; datagram contents are ignored but never truncated
/// into an error.
const MAX_DATAGRAM: usize = 65_536;

/// Turns each datagram arriving on the UDP socket into one telemetry sample.
pub struct TickSource {
    socket: UdpSocket,
    model: MotionModel,
    samples: SampleSender,
}

impl TickSource {
    pub async fn bind(
        addr: &str,
        model: MotionModel,
        samples: SampleSender,
    ) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| RelayError::UdpBind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            socket,
            model,
            samples,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams until the dispatcher goes away.
    pub async fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    log::trace!("Tick from {} ({} bytes)", from, len);
                    if self.samples.send(self.model.sample()).is_err() {
                        log::info!("Dispatcher closed, stopping UDP listener");
                        return;
                    }
                }
                Err(e) => {
                    log::debug!("UDP read error: {}", e);
                }
            }
        }
    }
}
