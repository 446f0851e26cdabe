//! Framing: JSON header + one delimiter byte + raw payload.

use crate::protocol::{Frame, FrameHeader, FRAME_DELIMITER, MAX_TOTAL_FRAMES};

/// Encode a frame: compact JSON header, `\n`, then the payload bytes verbatim.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameEncodeError> {
    if frame.total_frames > MAX_TOTAL_FRAMES {
        return Err(FrameEncodeError::TooManyFrames(frame.total_frames));
    }
    let header = serde_json::to_vec(&FrameHeader::for_frame(frame))?;
    let mut out = Vec::with_capacity(header.len() + 1 + frame.payload.len());
    out.extend_from_slice(&header);
    out.push(FRAME_DELIMITER);
    out.extend_from_slice(&frame.payload);
    Ok(out)
}

/// Error encoding a frame (header serialization or frame count limit).
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0} frames exceeds the frame count limit")]
    TooManyFrames(u32),
}

/// Decode one frame. Only the first delimiter is significant; the payload may contain more.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameFormatError> {
    let split = bytes
        .iter()
        .position(|&b| b == FRAME_DELIMITER)
        .ok_or(FrameFormatError::MissingDelimiter)?;
    let header: FrameHeader = serde_json::from_slice(&bytes[..split])?;
    if header.packet_id == 0 {
        return Err(FrameFormatError::OutOfRange("packetId"));
    }
    if header.total_packets == 0 || header.total_packets > MAX_TOTAL_FRAMES {
        return Err(FrameFormatError::OutOfRange("totalPackets"));
    }
    Ok(header.into_frame(bytes[split + 1..].to_vec()))
}

/// Error decoding a frame (no delimiter, bad header, or sequencing field out of range).
#[derive(Debug, thiserror::Error)]
pub enum FrameFormatError {
    #[error("no header delimiter found")]
    MissingDelimiter,
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] serde_json::Error),
    #[error("{0} out of range")]
    OutOfRange(&'static str),
}
