use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::telemetry::TelemetrySample;

use super::error::{HubError, SendError};
use super::subscriber::{SubscriberHandle, SubscriberId};

#[derive(Debug, Default)]
struct HubStats {
    samples_published: AtomicU64,
    frames_sent: AtomicU64,
    subscribers_dropped: AtomicU64,
    samples_dropped: AtomicU64,
}

/// Outcome of a single [`Hub::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub peer: Option<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStatus {
    pub started_at: DateTime<Utc>,
    pub subscribers: Vec<SubscriberInfo>,
    pub samples_published: u64,
    pub frames_sent: u64,
    pub subscribers_dropped: u64,
    pub samples_dropped: u64,
}

/// The set of live subscribers and the fan-out over it.
///
/// The set lock is only held to mutate or snapshot the map. Every
/// network write and close happens after the guard is released.
pub struct Hub {
    subscribers: Mutex<HashMap<SubscriberId, Arc<SubscriberHandle>>>,
    send_timeout: Duration,
    started_at: DateTime<Utc>,
    stats: HubStats,
}

impl Hub {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            send_timeout,
            started_at: Utc::now(),
            stats: HubStats::default(),
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<SubscriberHandle>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.subscribers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers().is_empty()
    }

    /// Add a subscriber. Returns `false` if it was already present or has
    /// been closed.
    pub fn register(&self, handle: Arc<SubscriberHandle>) -> bool {
        if handle.is_closed() {
            return false;
        }
        let mut subscribers = self.subscribers();
        if subscribers.contains_key(&handle.id()) {
            return false;
        }
        subscribers.insert(handle.id(), handle);
        true
    }

    /// Remove and close a subscriber. Returns `false` if it was not present.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers().remove(&id);
        match removed {
            Some(handle) => {
                handle.close(self.send_timeout).await;
                true
            }
            None => false,
        }
    }

    /// Serialize `sample` once and write it to every live subscriber.
    ///
    /// Writes run concurrently, each bounded by the send timeout. Any
    /// subscriber whose write fails is out of the set before this returns;
    /// its close handshake runs in the background.
    pub async fn publish(&self, sample: &TelemetrySample) -> Result<PublishReport, HubError> {
        let frame: Utf8Bytes = serde_json::to_string(sample)?.into();
        self.stats.samples_published.fetch_add(1, Ordering::Relaxed);

        let targets: Vec<_> = self.subscribers().values().cloned().collect();
        if targets.is_empty() {
            return Ok(PublishReport::default());
        }

        let sends = targets.iter().map(|handle| {
            let frame = frame.clone();
            async move { (handle, handle.send_text(frame, self.send_timeout).await) }
        });

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (handle, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(SendError::Closed) => {
                    // The read loop got there first and is unregistering it.
                    failed.push(handle.id());
                }
                Err(e) => {
                    log::warn!("Dropping subscriber {}: {}", handle.id(), e);
                    failed.push(handle.id());
                }
            }
        }

        let removed: Vec<_> = {
            let mut subscribers = self.subscribers();
            failed
                .iter()
                .filter_map(|id| subscribers.remove(id))
                .collect()
        };
        for handle in removed {
            handle.close_detached(self.send_timeout);
            report.dropped += 1;
        }

        self.stats
            .frames_sent
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.stats
            .subscribers_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);

        Ok(report)
    }

    /// Count a sample that never reached the dispatcher.
    pub fn record_dropped_sample(&self) {
        self.stats.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status(&self) -> RelayStatus {
        let mut subscribers: Vec<_> = self
            .subscribers()
            .values()
            .map(|handle| SubscriberInfo {
                id: handle.id(),
                peer: handle.peer().map(|addr| addr.to_string()),
                connected_at: handle.connected_at(),
            })
            .collect();
        subscribers.sort_by_key(|s| s.connected_at);

        RelayStatus {
            started_at: self.started_at,
            subscribers,
            samples_published: self.stats.samples_published.load(Ordering::Relaxed),
            frames_sent: self.stats.frames_sent.load(Ordering::Relaxed),
            subscribers_dropped: self.stats.subscribers_dropped.load(Ordering::Relaxed),
            samples_dropped: self.stats.samples_dropped.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.subscribers.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionConfig;
    use crate::hub::test_sink::{Behavior, TestSink};
    use crate::telemetry::MotionModel;
    use std::sync::atomic::AtomicBool;

    const DEADLINE: Duration = Duration::from_millis(50);

    fn sample_at(secs: u64) -> TelemetrySample {
        MotionModel::new(MotionConfig::default()).sample_at(Duration::from_secs(secs))
    }

    fn subscriber(behavior: Behavior) -> (Arc<SubscriberHandle>, Arc<crate::hub::test_sink::Probe>) {
        let (sink, probe) = TestSink::new(behavior);
        (Arc::new(SubscriberHandle::new(None, sink)), probe)
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let hub = Hub::new(DEADLINE);
        let report = hub.publish(&sample_at(0)).await.unwrap();
        assert_eq!(report, PublishReport::default());
        assert_eq!(hub.status().samples_published, 1);
        assert_eq!(hub.status().frames_sent, 0);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let hub = Hub::new(DEADLINE);
        let (handle, _) = subscriber(Behavior::Accept);

        assert!(hub.register(handle.clone()));
        assert!(!hub.register(handle.clone()));
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_closes_once() {
        let hub = Hub::new(DEADLINE);
        let (handle, probe) = subscriber(Behavior::Accept);
        hub.register(handle.clone());

        assert!(hub.unregister(handle.id()).await);
        assert!(!hub.unregister(handle.id()).await);
        assert!(hub.is_empty());
        assert!(handle.is_closed());
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn closed_handle_cannot_be_registered() {
        let hub = Hub::new(DEADLINE);
        let (handle, _) = subscriber(Behavior::Accept);
        handle.close(DEADLINE).await;

        assert!(!hub.register(handle));
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn every_subscriber_gets_identical_bytes_in_publish_order() {
        let hub = Hub::new(DEADLINE);
        let (a, probe_a) = subscriber(Behavior::Accept);
        let (b, probe_b) = subscriber(Behavior::Accept);
        hub.register(a);
        hub.register(b);

        let samples: Vec<_> = (0..5).map(sample_at).collect();
        for sample in &samples {
            let report = hub.publish(sample).await.unwrap();
            assert_eq!(report.delivered, 2);
        }

        let expected: Vec<_> = samples
            .iter()
            .map(|s| serde_json::to_string(s).unwrap())
            .collect();
        assert_eq!(probe_a.frames(), expected);
        assert_eq!(probe_b.frames(), expected);
        assert_eq!(hub.status().frames_sent, 10);
    }

    #[tokio::test]
    async fn failed_subscriber_is_removed_and_others_still_receive() {
        let hub = Hub::new(DEADLINE);
        let (good, good_probe) = subscriber(Behavior::Accept);
        let (broken, broken_probe) = subscriber(Behavior::Fail);
        hub.register(good);
        hub.register(broken.clone());

        let report = hub.publish(&sample_at(1)).await.unwrap();
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(hub.len(), 1);
        assert!(broken.is_closed());
        broken_probe.wait_for_closes(1).await;

        hub.publish(&sample_at(2)).await.unwrap();
        assert_eq!(good_probe.frames().len(), 2);
        assert!(broken_probe.frames().is_empty());
        assert_eq!(hub.status().subscribers_dropped, 1);

        // The read loop noticing the disconnect later must not close again.
        assert!(!hub.unregister(broken.id()).await);
        assert_eq!(broken_probe.closes(), 1);
    }

    #[tokio::test]
    async fn stalled_subscriber_is_dropped_within_deadline() {
        let hub = Hub::new(DEADLINE);
        let (fast, fast_probe) = subscriber(Behavior::Accept);
        let (slow, slow_probe) = subscriber(Behavior::Stall);
        hub.register(fast);
        hub.register(slow.clone());

        let started = tokio::time::Instant::now();
        let report = hub.publish(&sample_at(1)).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert!(elapsed < DEADLINE * 2, "publish took {:?}", elapsed);
        assert!(slow.is_closed());
        assert_eq!(hub.len(), 1);
        assert_eq!(fast_probe.frames().len(), 1);
        slow_probe.wait_for_closes(1).await;
        assert!(slow_probe.frames().is_empty());
    }

    #[tokio::test]
    async fn several_stalled_subscribers_cost_one_deadline() {
        let hub = Hub::new(DEADLINE);
        let (fast, fast_probe) = subscriber(Behavior::Accept);
        hub.register(fast);
        let stalled: Vec<_> = (0..3).map(|_| subscriber(Behavior::Stall)).collect();
        for (handle, _) in &stalled {
            hub.register(handle.clone());
        }

        let started = tokio::time::Instant::now();
        let report = hub.publish(&sample_at(1)).await.unwrap();
        assert_eq!(report, PublishReport { delivered: 1, dropped: 3 });
        hub.publish(&sample_at(2)).await.unwrap();
        let to_second_frame = started.elapsed();

        assert_eq!(fast_probe.frames().len(), 2);
        assert!(
            to_second_frame < DEADLINE * 2,
            "second frame after {:?}",
            to_second_frame
        );
        assert_eq!(hub.len(), 1);
        assert_eq!(hub.status().subscribers_dropped, 3);
        for (handle, probe) in &stalled {
            assert!(handle.is_closed());
            probe.wait_for_closes(1).await;
        }
    }

    #[tokio::test]
    async fn writes_happen_outside_the_set_lock() {
        let hub = Arc::new(Hub::new(DEADLINE));
        let locked_during_send = Arc::new(AtomicBool::new(false));

        for _ in 0..3 {
            let weak = Arc::downgrade(&hub);
            let flag = locked_during_send.clone();
            let (sink, _) = TestSink::new(Behavior::Accept);
            let sink = sink.on_send(move || {
                if weak.upgrade().is_some_and(|hub| hub.is_locked()) {
                    flag.store(true, Ordering::SeqCst);
                }
            });
            hub.register(Arc::new(SubscriberHandle::new(None, sink)));
        }

        let report = hub.publish(&sample_at(0)).await.unwrap();
        assert_eq!(report.delivered, 3);
        assert!(!locked_during_send.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn status_lists_live_subscribers() {
        let hub = Hub::new(DEADLINE);
        let peer = "127.0.0.1:40000".parse().unwrap();
        let (sink, _) = TestSink::new(Behavior::Accept);
        let handle = Arc::new(SubscriberHandle::new(Some(peer), sink));
        hub.register(handle.clone());

        let status = hub.status();
        assert_eq!(status.subscribers.len(), 1);
        assert_eq!(status.subscribers[0].id, handle.id());
        assert_eq!(status.subscribers[0].peer.as_deref(), Some("127.0.0.1:40000"));
    }
}
