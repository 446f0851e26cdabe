//! In-memory collaborators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use camlink_core::{Channel, PayloadStore, Publisher, Transform, TransformError, TransportSendError};

/// Records every published message; optionally fails one attempt (1-based).
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<(Channel, Vec<u8>)>>,
    attempts: AtomicUsize,
    fail_attempt: Option<usize>,
}

impl RecordingPublisher {
    pub fn failing_on(attempt: usize) -> Self {
        Self {
            fail_attempt: Some(attempt),
            ..Self::default()
        }
    }

    pub fn messages(&self, channel: Channel) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, channel: Channel, message: &[u8]) -> Result<(), TransportSendError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_attempt == Some(n) {
            return Err(TransportSendError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "broker unavailable",
            )));
        }
        self.sent.lock().unwrap().push((channel, message.to_vec()));
        Ok(())
    }
}

/// Keeps stored payloads in memory, along with the thread each write ran on.
#[derive(Default)]
pub struct MemoryStore {
    pub stored: Mutex<Vec<(String, Vec<u8>)>>,
    pub threads: Mutex<Vec<std::thread::ThreadId>>,
}

impl PayloadStore for MemoryStore {
    fn store(&self, name: &str, payload: &[u8]) -> std::io::Result<()> {
        self.stored
            .lock()
            .unwrap()
            .push((name.to_string(), payload.to_vec()));
        self.threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        Ok(())
    }
}

/// Reverses the payload bytes.
pub struct ReverseTransform;

impl Transform for ReverseTransform {
    fn apply(&self, _transfer_id: u32, payload: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(payload.iter().rev().copied().collect())
    }
}

pub struct FailingTransform;

impl Transform for FailingTransform {
    fn apply(&self, _transfer_id: u32, _payload: &[u8]) -> Result<Vec<u8>, TransformError> {
        Err(TransformError::Decode("not a jpeg".into()))
    }
}
