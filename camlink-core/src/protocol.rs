//! camlink wire protocol: frame and header types, channel names, statistics record.

use serde::{Deserialize, Serialize};

/// Byte separating the JSON header from the raw payload.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Default fragment payload size in bytes. Matches the camera firmware's packet size.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Largest accepted `totalPackets`: 128 MiB at the default chunk size.
pub const MAX_TOTAL_FRAMES: u32 = 65_536;

/// One bounded-size unit on the wire: sequencing metadata plus a slice of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub transfer_id: u32,
    /// 1-based position within the transfer.
    pub sequence_number: u32,
    pub total_frames: u32,
    /// Sender clock (ms since Unix epoch) at the start of the original transfer.
    pub origin_timestamp_ms: u64,
    pub payload: Vec<u8>,
}

/// Textual header preceding the delimiter. Field names are fixed by the camera firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameHeader {
    pub packet_id: u32,
    pub total_packets: u32,
    pub timestamp: u64,
    #[serde(default)]
    pub image_id: u32,
}

impl FrameHeader {
    pub fn for_frame(frame: &Frame) -> Self {
        Self {
            packet_id: frame.sequence_number,
            total_packets: frame.total_frames,
            timestamp: frame.origin_timestamp_ms,
            image_id: frame.transfer_id,
        }
    }

    pub fn into_frame(self, payload: Vec<u8>) -> Frame {
        Frame {
            transfer_id: self.image_id,
            sequence_number: self.packet_id,
            total_frames: self.total_packets,
            origin_timestamp_ms: self.timestamp,
            payload,
        }
    }
}

/// Logical pub/sub channels used by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Fragmented payloads arriving from the camera.
    InboundFrames,
    /// Fragmented replies going back to the camera.
    OutboundFrames,
    /// Out-of-band aggregate latency statistics.
    Statistics,
}

impl Channel {
    /// Topic name as used by the camera firmware.
    pub fn topic(self) -> &'static str {
        match self {
            Channel::InboundFrames => "esp32/image",
            Channel::OutboundFrames => "raspi/image",
            Channel::Statistics => "esp32/latency",
        }
    }
}

/// Aggregate latency statistics published on [`Channel::Statistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub measurements: u64,
    pub images_sent: u64,
    pub images_received: u64,
}
