//! Paced reply sender: fragment, then publish frames in order with a fixed gap.
//! No acknowledgements and no retries; a failed frame is logged and skipped.

use std::sync::Arc;
use std::time::Duration;

use camlink_core::{encode_frame, split_into_frames, Channel, Publisher};
use log::{debug, info, warn};

pub struct Sender {
    publisher: Arc<dyn Publisher>,
    chunk_size: usize,
    pacing: Duration,
}

impl Sender {
    pub fn new(publisher: Arc<dyn Publisher>, chunk_size: usize, pacing: Duration) -> Self {
        Self {
            publisher,
            chunk_size,
            pacing,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Send `payload` as `transfer_id`, stamping every frame with `echo_timestamp_ms` so the
    /// peer measures against its original send time. Returns the number of frames published.
    pub async fn send(&self, payload: &[u8], echo_timestamp_ms: u64, transfer_id: u32) -> usize {
        let frames = split_into_frames(payload, transfer_id, echo_timestamp_ms, self.chunk_size);
        let total = frames.len();
        info!(
            "sending transfer {} ({} bytes in {} frames)",
            transfer_id,
            payload.len(),
            total
        );
        let mut sent = 0;
        for (i, frame) in frames.iter().enumerate() {
            let bytes = match encode_frame(frame) {
                Ok(b) => b,
                Err(e) => {
                    warn!("cannot encode transfer {}: {}", transfer_id, e);
                    return sent;
                }
            };
            match self.publisher.publish(Channel::OutboundFrames, &bytes) {
                Ok(()) => {
                    sent += 1;
                    debug!("sent frame {}/{}", frame.sequence_number, total);
                }
                Err(e) => warn!(
                    "failed to send frame {}/{} of transfer {}: {}",
                    frame.sequence_number, total, transfer_id, e
                ),
            }
            if i + 1 < total && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
        sent
    }
}
