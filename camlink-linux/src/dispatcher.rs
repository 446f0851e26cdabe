//! Routes inbound frames into the reassembly engine and hands completed transfers to a
//! spawned task, so the receive loop only ever decodes and takes one short lock.

use std::sync::{Arc, Mutex, MutexGuard};

use camlink_core::{decode_frame, LatencyReport, ReassemblyEngine, SessionEvent};
use log::{info, warn};
use tokio::task::JoinHandle;

use crate::pipeline::Pipeline;

pub struct Dispatcher {
    engine: Mutex<ReassemblyEngine>,
    pipeline: Arc<Pipeline>,
}

impl Dispatcher {
    pub fn new(engine: ReassemblyEngine, pipeline: Arc<Pipeline>) -> Self {
        Self {
            engine: Mutex::new(engine),
            pipeline,
        }
    }

    /// Handle one transport message. Must be called from within a tokio runtime.
    /// Returns the completion task when this frame finished a transfer.
    pub fn on_frame(&self, bytes: &[u8]) -> Option<JoinHandle<()>> {
        let frame = match decode_frame(bytes) {
            Ok(f) => f,
            Err(e) => {
                warn!("dropping malformed frame ({} bytes): {}", bytes.len(), e);
                return None;
            }
        };
        let event = self.engine().accept(frame);
        match event {
            SessionEvent::Completed(done) => {
                let pipeline = self.pipeline.clone();
                Some(tokio::spawn(pipeline.process(done)))
            }
            SessionEvent::Progress { .. } | SessionEvent::Abandoned(_) | SessionEvent::Ignored => {
                None
            }
        }
    }

    /// Advance the engine's idle clock.
    pub fn tick(&self) {
        // Abandonment is logged by the engine.
        let _ = self.engine().tick();
    }

    /// Log a statistics record published by the peer.
    pub fn on_stats(&self, bytes: &[u8]) {
        match serde_json::from_slice::<LatencyReport>(bytes) {
            Ok(stats) => {
                info!("received latency statistics from peer:");
                info!("  average latency: {:.2} ms", stats.avg_latency_ms);
                info!("  min latency: {} ms", stats.min_latency_ms);
                info!("  max latency: {} ms", stats.max_latency_ms);
                info!("  measurements: {}", stats.measurements);
                info!("  images sent: {}", stats.images_sent);
                info!("  images received: {}", stats.images_received);
            }
            Err(e) => warn!("error processing latency statistics: {}", e),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn engine(&self) -> MutexGuard<'_, ReassemblyEngine> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::Sender;
    use crate::test_support::{MemoryStore, RecordingPublisher, ReverseTransform};
    use camlink_core::{encode_frame, split_into_frames, Channel, Frame};
    use std::time::Duration;

    fn dispatcher(publisher: Arc<RecordingPublisher>, idle_timeout: u64) -> Dispatcher {
        let sender = Sender::new(publisher.clone(), 2048, Duration::ZERO);
        let pipeline = Pipeline::new(
            Arc::new(ReverseTransform),
            Arc::new(MemoryStore::default()),
            publisher,
            sender,
            100,
            false,
        );
        Dispatcher::new(
            ReassemblyEngine::with_idle_timeout(idle_timeout),
            Arc::new(pipeline),
        )
    }

    fn frame(transfer_id: u32, seq: u32, total: u32, payload: &[u8]) -> Vec<u8> {
        encode_frame(&Frame {
            transfer_id,
            sequence_number: seq,
            total_frames: total,
            origin_timestamp_ms: 500,
            payload: payload.to_vec(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn completed_transfer_is_processed_off_the_receive_path() {
        let publisher = Arc::new(RecordingPublisher::default());
        let d = dispatcher(publisher.clone(), 10);
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 7) as u8).collect();
        let frames = split_into_frames(&data, 3, 500, 4096);

        let mut handles = Vec::new();
        for f in [&frames[2], &frames[0], &frames[1]] {
            handles.extend(d.on_frame(&encode_frame(f).unwrap()));
        }
        assert_eq!(handles.len(), 1);
        for h in handles {
            h.await.unwrap();
        }

        let body: Vec<u8> = publisher
            .messages(Channel::OutboundFrames)
            .iter()
            .flat_map(|m| decode_frame(m).unwrap().payload)
            .collect();
        let expected: Vec<u8> = data.iter().rev().copied().collect();
        assert_eq!(body, expected);
        assert_eq!(d.pipeline().report().images_received, 1);
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_without_session_impact() {
        let publisher = Arc::new(RecordingPublisher::default());
        let d = dispatcher(publisher, 10);
        assert!(d.on_frame(&frame(1, 1, 2, b"a")).is_none());
        assert!(d.on_frame(b"no delimiter here").is_none());
        assert!(d.on_frame(b"{\"packetId\":2}\nxx").is_none());
        let handle = d.on_frame(&frame(1, 2, 2, b"b"));
        assert!(handle.is_some());
        handle.unwrap().await.unwrap();
    }

    #[tokio::test]
    async fn superseded_transfer_emits_nothing() {
        let publisher = Arc::new(RecordingPublisher::default());
        let d = dispatcher(publisher.clone(), 10);
        assert!(d.on_frame(&frame(1, 1, 3, b"a")).is_none());
        assert!(d.on_frame(&frame(1, 2, 3, b"b")).is_none());
        assert!(d.on_frame(&frame(2, 1, 2, b"x")).is_none());
        assert!(d.on_frame(&frame(1, 3, 3, b"c")).is_none());
        let handle = d.on_frame(&frame(2, 2, 2, b"y")).expect("transfer 2 completes");
        handle.await.unwrap();

        let replies: Vec<Frame> = publisher
            .messages(Channel::OutboundFrames)
            .iter()
            .map(|m| decode_frame(m).unwrap())
            .collect();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].transfer_id, 2);
        assert_eq!(replies[0].payload, b"yx");
    }

    #[tokio::test]
    async fn gap_never_completes() {
        let publisher = Arc::new(RecordingPublisher::default());
        let d = dispatcher(publisher.clone(), 10);
        for (seq, p) in [(1, b"a"), (3, b"c"), (4, b"d")] {
            assert!(d.on_frame(&frame(1, seq, 3, p)).is_none());
        }
        assert!(d.on_frame(&frame(1, 2, 3, b"b")).is_none());
        assert_eq!(publisher.attempts(), 0);
    }

    #[tokio::test]
    async fn tick_expires_idle_transfer() {
        let publisher = Arc::new(RecordingPublisher::default());
        let d = dispatcher(publisher, 1);
        d.on_frame(&frame(1, 1, 2, b"a"));
        d.tick();
        d.tick();
        // Transfer was abandoned; its last frame no longer completes it.
        assert!(d.on_frame(&frame(1, 2, 2, b"b")).is_none());
    }

    #[tokio::test]
    async fn concurrent_completions_do_not_block_each_other() {
        let publisher = Arc::new(RecordingPublisher::default());
        let d = Arc::new(dispatcher(publisher.clone(), 10));
        let mut handles = Vec::new();
        for id in 1..=5u32 {
            let payload = vec![id as u8; 10];
            let mut f = split_into_frames(&payload, id, id as u64, 4);
            f.reverse();
            for frame in f {
                handles.extend(d.on_frame(&encode_frame(&frame).unwrap()));
            }
        }
        assert_eq!(handles.len(), 5);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(d.pipeline().report().images_sent, 5);
    }

    #[test]
    fn stats_record_is_parsed_or_rejected() {
        let d = dispatcher(Arc::new(RecordingPublisher::default()), 10);
        d.on_stats(
            br#"{"avg_latency_ms":12.5,"min_latency_ms":10,"max_latency_ms":15,"measurements":4,"images_sent":4,"images_received":3}"#,
        );
        d.on_stats(b"not json");
    }
}
