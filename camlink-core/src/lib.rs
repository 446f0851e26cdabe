//! camlink chunked image transfer protocol.
//! Host-driven: no I/O; host feeds frames and receives session events.

pub mod chunk;
pub mod host;
pub mod latency;
pub mod protocol;
pub mod session;
pub mod wire;

pub use chunk::{frame_count, split_into_frames};
pub use host::{EchoTransform, PayloadStore, Publisher, Transform, TransformError, TransportSendError};
pub use latency::{LatencyRecorder, LatencySample, LatencyStats};
pub use protocol::{Channel, Frame, LatencyReport, DEFAULT_CHUNK_SIZE, MAX_TOTAL_FRAMES};
pub use session::{
    CompletedTransfer, PartialTransferError, ReassemblyEngine, SessionEvent, SessionState,
};
pub use wire::{decode_frame, encode_frame, FrameEncodeError, FrameFormatError};
