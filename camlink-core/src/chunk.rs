//! Chunking: split an outbound payload into frames, join received fragments back in order.

use std::collections::HashMap;

use crate::protocol::{Frame, DEFAULT_CHUNK_SIZE};

/// Number of frames needed for `payload_len` bytes: `ceil(payload_len / chunk_size)`.
pub fn frame_count(payload_len: usize, chunk_size: usize) -> usize {
    let size = effective_chunk_size(chunk_size);
    payload_len.div_ceil(size)
}

/// Split a payload into frames of at most `chunk_size` bytes, numbered `1..=N`.
/// Every frame carries `total_frames = N` and the same echo timestamp.
pub fn split_into_frames(
    payload: &[u8],
    transfer_id: u32,
    echo_timestamp_ms: u64,
    chunk_size: usize,
) -> Vec<Frame> {
    let size = effective_chunk_size(chunk_size);
    let total = payload.len().div_ceil(size) as u32;
    payload
        .chunks(size)
        .enumerate()
        .map(|(i, slice)| Frame {
            transfer_id,
            sequence_number: i as u32 + 1,
            total_frames: total,
            origin_timestamp_ms: echo_timestamp_ms,
            payload: slice.to_vec(),
        })
        .collect()
}

fn effective_chunk_size(chunk_size: usize) -> usize {
    if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    }
}

/// Number of sequence numbers in `1..=total` with no fragment.
pub fn missing_count(fragments: &HashMap<u32, Vec<u8>>, total: u32) -> usize {
    let held = fragments.keys().filter(|&&seq| seq >= 1 && seq <= total).count();
    total as usize - held
}

/// The first `limit` sequence numbers in `1..=total` with no fragment, ascending.
pub fn missing_sequence_numbers(
    fragments: &HashMap<u32, Vec<u8>>,
    total: u32,
    limit: usize,
) -> Vec<u32> {
    (1..=total)
        .filter(|seq| !fragments.contains_key(seq))
        .take(limit)
        .collect()
}

/// Concatenate fragments `1..=total` in sequence order, or `None` if any is missing.
pub fn reassemble(fragments: &HashMap<u32, Vec<u8>>, total: u32) -> Option<Vec<u8>> {
    let len = fragments.values().map(Vec::len).sum();
    let mut out = Vec::with_capacity(len);
    for seq in 1..=total {
        out.extend_from_slice(fragments.get(&seq)?);
    }
    Some(out)
}
