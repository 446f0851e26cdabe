//! Reassembly engine: one current transfer session, fed frame by frame.
//!
//! A session is keyed by transfer id and origin timestamp. A frame whose key differs from
//! the current session's replaces it, whatever its sequence number.
//! Fragments are keyed by sequence number so reordering within a transfer is tolerated;
//! loss is only detected, never repaired.

use std::collections::{HashMap, VecDeque};

use log::{debug, info, warn};

use crate::chunk;
use crate::protocol::Frame;

/// Ticks without a new fragment before a collecting session is abandoned.
pub const DEFAULT_IDLE_TIMEOUT_TICKS: u64 = 10;

/// How many superseded transfers are remembered so their late frames can be dropped.
const RETIRED_CAPACITY: usize = 16;

/// Missing sequence numbers listed in a `PartialTransferError` or supersession warning.
pub const MISSING_ID_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Collecting,
    Complete,
    Abandoned,
}

/// One in-progress or finished transfer.
#[derive(Debug)]
pub struct Session {
    transfer_id: u32,
    expected_total: u32,
    origin_timestamp_ms: u64,
    fragments: HashMap<u32, Vec<u8>>,
    state: SessionState,
    last_activity_tick: u64,
}

impl Session {
    fn new(frame: &Frame, tick: u64) -> Self {
        Self {
            transfer_id: frame.transfer_id,
            expected_total: frame.total_frames,
            origin_timestamp_ms: frame.origin_timestamp_ms,
            fragments: HashMap::new(),
            state: SessionState::Collecting,
            last_activity_tick: tick,
        }
    }

    pub fn transfer_id(&self) -> u32 {
        self.transfer_id
    }

    pub fn expected_total(&self) -> u32 {
        self.expected_total
    }

    pub fn origin_timestamp_ms(&self) -> u64 {
        self.origin_timestamp_ms
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Distinct fragments held. Always `<= expected_total`.
    pub fn received(&self) -> usize {
        self.fragments.len()
    }

    pub fn missing_count(&self) -> usize {
        chunk::missing_count(&self.fragments, self.expected_total)
    }

    /// The first `MISSING_ID_LIMIT` missing sequence numbers.
    pub fn missing(&self) -> Vec<u32> {
        chunk::missing_sequence_numbers(&self.fragments, self.expected_total, MISSING_ID_LIMIT)
    }

    fn key(&self) -> (u32, u64) {
        (self.transfer_id, self.origin_timestamp_ms)
    }

    /// Move to `Abandoned`, releasing fragment memory.
    fn abandon(&mut self) -> PartialTransferError {
        let err = PartialTransferError {
            transfer_id: self.transfer_id,
            received: self.fragments.len(),
            total: self.expected_total,
            missing_count: self.missing_count(),
            missing: self.missing(),
        };
        self.state = SessionState::Abandoned;
        self.fragments = HashMap::new();
        err
    }
}

/// Owned snapshot of a completed transfer, safe to process off the receive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub transfer_id: u32,
    pub total_frames: u32,
    pub origin_timestamp_ms: u64,
    pub fragments: HashMap<u32, Vec<u8>>,
}

impl CompletedTransfer {
    pub fn payload_len(&self) -> usize {
        self.fragments.values().map(Vec::len).sum()
    }

    /// Concatenate fragments in sequence order. A completed transfer has no gaps.
    pub fn into_payload(self) -> Vec<u8> {
        chunk::reassemble(&self.fragments, self.total_frames).unwrap_or_default()
    }
}

/// A session reached its expected fragment count (or went idle, or was superseded) with gaps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "transfer {transfer_id} incomplete: {received} of {total} fragments, {missing_count} missing (first {missing:?})"
)]
pub struct PartialTransferError {
    pub transfer_id: u32,
    pub received: usize,
    pub total: u32,
    pub missing_count: usize,
    /// At most `MISSING_ID_LIMIT` ids, ascending.
    pub missing: Vec<u32>,
}

/// Outcome of feeding one frame to the engine.
#[derive(Debug)]
pub enum SessionEvent {
    /// Fragment stored; transfer still collecting.
    Progress {
        transfer_id: u32,
        received: usize,
        total: u32,
    },
    /// All fragments present; the session has handed its data over.
    Completed(CompletedTransfer),
    /// Expected count reached with gaps; session abandoned.
    Abandoned(PartialTransferError),
    /// Frame dropped: late frame of a superseded transfer, or session already finished.
    Ignored,
}

/// Owns the current session. `accept` and `tick` are the only mutation entry points.
#[derive(Debug)]
pub struct ReassemblyEngine {
    current: Option<Session>,
    retired: VecDeque<(u32, u64)>,
    tick_count: u64,
    idle_timeout_ticks: u64,
}

impl ReassemblyEngine {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT_TICKS)
    }

    pub fn with_idle_timeout(idle_timeout_ticks: u64) -> Self {
        Self {
            current: None,
            retired: VecDeque::with_capacity(RETIRED_CAPACITY),
            tick_count: 0,
            idle_timeout_ticks,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Apply one frame to the state machine.
    pub fn accept(&mut self, frame: Frame) -> SessionEvent {
        let key = (frame.transfer_id, frame.origin_timestamp_ms);
        let starts_new = self.current.as_ref().map_or(true, |s| s.key() != key);
        if starts_new {
            if self.retired.contains(&key) {
                debug!(
                    "dropping late frame {}/{} of superseded transfer {} (ts {})",
                    frame.sequence_number, frame.total_frames, key.0, key.1
                );
                return SessionEvent::Ignored;
            }
            self.start_session(&frame);
        }

        let tick = self.tick_count;
        let Some(session) = self.current.as_mut() else {
            return SessionEvent::Ignored;
        };
        if session.state != SessionState::Collecting {
            debug!(
                "ignoring frame {} for finished transfer {} ({:?})",
                frame.sequence_number, session.transfer_id, session.state
            );
            return SessionEvent::Ignored;
        }

        debug!(
            "received frame {}/{} for transfer {}",
            frame.sequence_number, frame.total_frames, frame.transfer_id
        );
        session.fragments.insert(frame.sequence_number, frame.payload);
        session.last_activity_tick = tick;

        if session.fragments.len() < session.expected_total as usize {
            return SessionEvent::Progress {
                transfer_id: session.transfer_id,
                received: session.fragments.len(),
                total: session.expected_total,
            };
        }

        if session.missing_count() > 0 {
            let err = session.abandon();
            warn!("{}; abandoning", err);
            return SessionEvent::Abandoned(err);
        }

        session.state = SessionState::Complete;
        info!(
            "transfer {} complete ({} fragments)",
            session.transfer_id, session.expected_total
        );
        SessionEvent::Completed(CompletedTransfer {
            transfer_id: session.transfer_id,
            total_frames: session.expected_total,
            origin_timestamp_ms: session.origin_timestamp_ms,
            fragments: std::mem::take(&mut session.fragments),
        })
    }

    /// Advance the logical clock; abandon the current session if it has been idle too long.
    pub fn tick(&mut self) -> Option<PartialTransferError> {
        self.tick_count = self.tick_count.saturating_add(1);
        let session = self.current.as_mut()?;
        if session.state != SessionState::Collecting {
            return None;
        }
        if self.tick_count.saturating_sub(session.last_activity_tick) <= self.idle_timeout_ticks {
            return None;
        }
        let err = session.abandon();
        warn!("{} after {} idle ticks; abandoning", err, self.idle_timeout_ticks);
        Some(err)
    }

    fn start_session(&mut self, frame: &Frame) {
        if let Some(old) = self.current.take() {
            if old.state == SessionState::Collecting {
                warn!(
                    "transfer {} (ts {}) superseded by transfer {} (ts {}), {} of {} fragments received, {} missing (first {:?})",
                    old.transfer_id,
                    old.origin_timestamp_ms,
                    frame.transfer_id,
                    frame.origin_timestamp_ms,
                    old.received(),
                    old.expected_total,
                    old.missing_count(),
                    old.missing()
                );
            }
            self.retire(old.key());
        }
        self.current = Some(Session::new(frame, self.tick_count));
    }

    fn retire(&mut self, key: (u32, u64)) {
        if self.retired.len() == RETIRED_CAPACITY {
            self.retired.pop_front();
        }
        self.retired.push_back(key);
    }
}

impl Default for ReassemblyEngine {
    fn default() -> Self {
        Self::new()
    }
}
