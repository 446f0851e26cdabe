//! Host collaborators: the core never does I/O itself. The host supplies a transport,
//! a payload transform and a store through these traits.

use crate::protocol::Channel;

/// Publishes one message on a pub/sub channel.
pub trait Publisher: Send + Sync {
    fn publish(&self, channel: Channel, message: &[u8]) -> Result<(), TransportSendError>;
}

/// Transforms a reassembled payload into the reply payload (e.g. an image effect).
pub trait Transform: Send + Sync {
    fn apply(&self, transfer_id: u32, payload: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Persists a payload under a name chosen by the caller.
pub trait PayloadStore: Send + Sync {
    fn store(&self, name: &str, payload: &[u8]) -> std::io::Result<()>;
}

/// Returns the payload unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTransform;

impl Transform for EchoTransform {
    fn apply(&self, _transfer_id: u32, payload: &[u8]) -> Result<Vec<u8>, TransformError> {
        if payload.is_empty() {
            return Err(TransformError::EmptyPayload);
        }
        Ok(payload.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("empty payload")]
    EmptyPayload,
    #[error("could not decode payload: {0}")]
    Decode(String),
    #[error("transform failed: {0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportSendError {
    #[error("channel {0:?} is not configured")]
    NotConfigured(Channel),
    #[error("message of {len} bytes exceeds transport limit of {limit}")]
    TooLarge { len: usize, limit: usize },
    #[error("publish failed: {0}")]
    Io(#[from] std::io::Error),
}

/// File name for a received payload: `image_{id}_{ms}.jpg`, with `_processed` for replies.
pub fn payload_file_name(transfer_id: u32, at_ms: u64, processed: bool) -> String {
    if processed {
        format!("image_{}_{}_processed.jpg", transfer_id, at_ms)
    } else {
        format!("image_{}_{}.jpg", transfer_id, at_ms)
    }
}
