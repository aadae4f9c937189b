//! Mock Link for Testing
//!
//! Scripted controller: each queued chunk answers one `read` call. An empty
//! chunk (or an empty queue) models silence until the timeout. The handle is
//! cheap to clone so a test can keep one while the engine owns another.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::Link;
use crate::error::{OptolinkError, Result};

#[derive(Debug, Default)]
struct MockLinkState {
    /// Responses, consumed one per read call
    responses: VecDeque<Vec<u8>>,
    /// Every frame written, in order
    sent: Vec<Vec<u8>>,
    /// Remaining reads before the injected hard fault fires
    fault_after: Option<usize>,
    /// Requested window of every read call
    read_windows: Vec<Duration>,
}

/// In-memory [`Link`] driven by a response script
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<MockLinkState>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer to the next unanswered read call.
    pub fn push_response(&self, data: impl Into<Vec<u8>>) -> &Self {
        self.state.lock().responses.push_back(data.into());
        self
    }

    /// Queue a read that times out with nothing received.
    pub fn push_silence(&self) -> &Self {
        self.push_response(Vec::new())
    }

    /// Make every read fail with a hard I/O fault once `reads` more reads
    /// have been answered.
    pub fn inject_fault_after(&self, reads: usize) {
        self.state.lock().fault_after = Some(reads);
    }

    /// Make the next read fail with a hard I/O fault.
    pub fn inject_fault(&self) {
        self.inject_fault_after(0);
    }

    /// All frames written so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Windows requested by every read call so far
    pub fn read_windows(&self) -> Vec<Duration> {
        self.state.lock().read_windows.clone()
    }
}

#[async_trait]
impl Link for MockLink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.read_windows.push(timeout);

        if let Some(remaining) = state.fault_after.as_mut() {
            if *remaining == 0 {
                return Err(OptolinkError::io("mock link unplugged"));
            }
            *remaining -= 1;
        }

        let mut chunk = state.responses.pop_front().unwrap_or_default();
        if chunk.len() > max {
            // Surplus stays on the line for the next read
            let rest = chunk.split_off(max);
            state.responses.push_front(rest);
        }
        debug!(length = chunk.len(), max, "[Mock Link] read");
        Ok(chunk)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.fault_after == Some(0) {
            return Err(OptolinkError::io("mock link unplugged"));
        }
        state.sent.push(data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_reads() {
        let mut link = MockLink::new();
        link.push_response([0x05]).push_silence();

        let timeout = Duration::from_millis(10);
        assert_eq!(link.read(1, timeout).await.unwrap(), vec![0x05]);
        assert!(link.read(1, timeout).await.unwrap().is_empty());
        // Exhausted script behaves like silence
        assert!(link.read(1, timeout).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_surplus_bytes_stay_queued() {
        let mut link = MockLink::new();
        link.push_response([0x01, 0x02, 0x03]);

        let timeout = Duration::from_millis(10);
        assert_eq!(link.read(2, timeout).await.unwrap(), vec![0x01, 0x02]);
        assert_eq!(link.read(2, timeout).await.unwrap(), vec![0x03]);
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let observer = MockLink::new();
        let mut link = observer.clone();
        link.write(&[0xF7, 0x08, 0x00, 0x02]).await.unwrap();
        assert_eq!(observer.sent(), vec![vec![0xF7, 0x08, 0x00, 0x02]]);
    }

    #[tokio::test]
    async fn test_injected_fault_is_fatal() {
        let mut link = MockLink::new();
        link.push_response([0x05]);
        link.inject_fault_after(1);

        let timeout = Duration::from_millis(10);
        assert!(link.read(1, timeout).await.is_ok());
        let err = link.read(1, timeout).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(link.write(&[0x01]).await.unwrap_err().is_fatal());
    }
}
