use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::telemetry::TelemetrySample;

use super::error::HubError;
use super::hub::Hub;

/// Producer end of the sample queue. Sending never waits.
#[derive(Clone)]
pub struct SampleSender {
    tx: mpsc::Sender<TelemetrySample>,
    hub: Arc<Hub>,
}

impl SampleSender {
    /// Queue a sample for dispatch. A full queue drops the sample; only a
    /// stopped dispatcher is an error.
    pub fn send(&self, sample: TelemetrySample) -> Result<(), HubError> {
        match self.tx.try_send(sample) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.hub.record_dropped_sample();
                log::warn!("Dispatcher is behind, dropping sample");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(HubError::DispatcherClosed),
        }
    }
}

pub fn channel(hub: Arc<Hub>, capacity: usize) -> (SampleSender, mpsc::Receiver<TelemetrySample>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (SampleSender { tx, hub }, rx)
}

/// Publish queued samples one at a time until every sender is gone.
pub async fn run_dispatcher(hub: Arc<Hub>, mut rx: mpsc::Receiver<TelemetrySample>) {
    while let Some(sample) = rx.recv().await {
        if let Err(e) = hub.publish(&sample).await {
            log::error!("Failed to publish sample: {}", e);
        }
    }
    log::info!("Dispatcher stopped");
}
