//! Completion pipeline for one reassembled transfer: store, transform, record latency,
//! reply, publish statistics. Runs on its own task, never on the receive path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use camlink_core::host::payload_file_name;
use camlink_core::latency::{now_ms, one_way_latency_ms};
use camlink_core::{
    Channel, CompletedTransfer, LatencyRecorder, LatencyReport, PayloadStore, Publisher,
    Transform, TransformError,
};
use log::{error, info, warn};

use crate::sender::Sender;

pub struct Pipeline {
    transform: Arc<dyn Transform>,
    store: Arc<dyn PayloadStore>,
    publisher: Arc<dyn Publisher>,
    sender: Sender,
    latency: Mutex<LatencyRecorder>,
    images_received: AtomicU64,
    images_sent: AtomicU64,
    publish_stats: bool,
}

impl Pipeline {
    pub fn new(
        transform: Arc<dyn Transform>,
        store: Arc<dyn PayloadStore>,
        publisher: Arc<dyn Publisher>,
        sender: Sender,
        latency_window: usize,
        publish_stats: bool,
    ) -> Self {
        Self {
            transform,
            store,
            publisher,
            sender,
            latency: Mutex::new(LatencyRecorder::new(latency_window)),
            images_received: AtomicU64::new(0),
            images_sent: AtomicU64::new(0),
            publish_stats,
        }
    }

    /// Process one completed transfer end to end. Errors are logged; nothing propagates.
    pub async fn process(self: Arc<Self>, done: CompletedTransfer) {
        let received_at = now_ms();
        let transfer_id = done.transfer_id;
        let origin = done.origin_timestamp_ms;
        let latency_ms = one_way_latency_ms(received_at, origin);
        let payload = Arc::new(done.into_payload());
        self.images_received.fetch_add(1, Ordering::Relaxed);
        info!(
            "transfer {} reception latency: {:.2} ms ({} bytes)",
            transfer_id,
            latency_ms,
            payload.len()
        );

        let name = payload_file_name(transfer_id, received_at, false);
        match self.store_blocking(name.clone(), payload.clone()).await {
            Ok(()) => info!("saved transfer {} as {}", transfer_id, name),
            Err(e) => warn!("could not store transfer {}: {}", transfer_id, e),
        }

        let started = Instant::now();
        let result = self.run_transform(transfer_id, payload).await;
        info!(
            "transfer {} processing time: {:.2} ms",
            transfer_id,
            started.elapsed().as_secs_f64() * 1000.0
        );

        let average = self.record_latency(latency_ms, received_at);
        info!("average one-way latency: {:.2} ms", average);

        let processed = match result {
            Ok(p) => Arc::new(p),
            Err(e) => {
                error!("transform failed for transfer {}, no reply sent: {}", transfer_id, e);
                return;
            }
        };

        let name = payload_file_name(transfer_id, received_at, true);
        if let Err(e) = self.store_blocking(name, processed.clone()).await {
            warn!("could not store processed transfer {}: {}", transfer_id, e);
        }

        let total = camlink_core::frame_count(processed.len(), self.sender.chunk_size());
        let sent = self.sender.send(&processed, origin, transfer_id).await;
        if sent == total {
            self.images_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            warn!(
                "reply for transfer {} incomplete: {} of {} frames published",
                transfer_id, sent, total
            );
        }

        if self.publish_stats {
            self.publish_report();
        }
    }

    async fn store_blocking(&self, name: String, payload: Arc<Vec<u8>>) -> std::io::Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.store(&name, &payload))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    async fn run_transform(
        &self,
        transfer_id: u32,
        payload: Arc<Vec<u8>>,
    ) -> Result<Vec<u8>, TransformError> {
        let transform = self.transform.clone();
        tokio::task::spawn_blocking(move || transform.apply(transfer_id, &payload))
            .await
            .unwrap_or_else(|e| Err(TransformError::Failed(e.to_string())))
    }

    fn record_latency(&self, latency_ms: f64, at_ms: u64) -> f64 {
        let mut recorder = self.latency.lock().unwrap_or_else(|e| e.into_inner());
        recorder.record(latency_ms, at_ms)
    }

    /// Current aggregate statistics.
    pub fn report(&self) -> LatencyReport {
        let stats = self
            .latency
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stats();
        LatencyReport {
            avg_latency_ms: stats.average_ms,
            min_latency_ms: stats.min_ms,
            max_latency_ms: stats.max_ms,
            measurements: stats.measurements as u64,
            images_sent: self.images_sent.load(Ordering::Relaxed),
            images_received: self.images_received.load(Ordering::Relaxed),
        }
    }

    fn publish_report(&self) {
        let report = self.report();
        match serde_json::to_vec(&report) {
            Ok(bytes) => {
                if let Err(e) = self.publisher.publish(Channel::Statistics, &bytes) {
                    warn!("failed to publish statistics: {}", e);
                }
            }
            Err(e) => warn!("failed to encode statistics: {}", e),
        }
    }
}
