//! Shared bridge state
//!
//! The only data shared between the poll loop and the HTTP side: the pending
//! write slot, the latest decoded values and the last cycle report. One mutex
//! guards all of it; it is never held across an `.await`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use optolink::{Value, WriteCommand};
use parking_lot::Mutex;
use serde::Serialize;

use crate::scheduler::CycleReport;

#[derive(Debug)]
struct StateInner {
    /// At most one outstanding control action, last write wins
    pending: Option<Arc<WriteCommand>>,
    /// Latest value per read command, indexed by registry position
    values: Vec<Value>,
    last_cycle: Option<CycleReport>,
}

/// Point-in-time copy for rendering
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub values: Vec<Value>,
    pub pending_action: Option<String>,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Debug)]
pub struct BridgeState {
    inner: Mutex<StateInner>,
    started_at: DateTime<Utc>,
}

impl BridgeState {
    /// State for a registry with `read_count` read commands, all unavailable
    pub fn new(read_count: usize) -> Self {
        Self {
            inner: Mutex::new(StateInner {
                pending: None,
                values: vec![Value::Unavailable; read_count],
                last_cycle: None,
            }),
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Replace the pending write. Returns the request it displaced, if any.
    pub fn enqueue_write(&self, command: Arc<WriteCommand>) -> Option<Arc<WriteCommand>> {
        self.inner.lock().pending.replace(command)
    }

    /// Consume the pending write. The slot is empty afterwards no matter how
    /// the execution turns out.
    pub fn take_pending(&self) -> Option<Arc<WriteCommand>> {
        self.inner.lock().pending.take()
    }

    pub fn pending_action(&self) -> Option<String> {
        self.inner.lock().pending.as_ref().map(|c| c.id.clone())
    }

    /// Store the latest value of the read command at `index`
    pub fn set_value(&self, index: usize, value: Value) {
        if let Some(slot) = self.inner.lock().values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn values(&self) -> Vec<Value> {
        self.inner.lock().values.clone()
    }

    pub fn record_cycle(&self, report: CycleReport) {
        self.inner.lock().last_cycle = Some(report);
    }

    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.inner.lock().last_cycle.clone()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.lock();
        StateSnapshot {
            values: inner.values.clone(),
            pending_action: inner.pending.as_ref().map(|c| c.id.clone()),
            last_cycle: inner.last_cycle.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use optolink::{CommandRegistry, CommandSetConfig};

    fn registry() -> CommandRegistry {
        CommandRegistry::build(&CommandSetConfig::kw1()).unwrap()
    }

    #[test]
    fn test_last_write_wins() {
        let registry = registry();
        let state = BridgeState::new(registry.reads().len());

        assert!(state.enqueue_write(registry.write("party_on").unwrap()).is_none());
        let displaced = state.enqueue_write(registry.write("dhw_50").unwrap());
        assert_eq!(displaced.unwrap().id, "party_on");
        assert_eq!(state.pending_action().as_deref(), Some("dhw_50"));

        assert_eq!(state.take_pending().unwrap().id, "dhw_50");
        assert!(state.take_pending().is_none());
        assert!(state.pending_action().is_none());
    }

    #[test]
    fn test_values_start_unavailable() {
        let state = BridgeState::new(3);
        assert_eq!(state.values(), vec![Value::Unavailable; 3]);

        state.set_value(1, Value::Float(21.5));
        // Out of range is ignored
        state.set_value(7, Value::Integer(1));
        assert_eq!(
            state.values(),
            vec![Value::Unavailable, Value::Float(21.5), Value::Unavailable]
        );
    }

    #[test]
    fn test_snapshot() {
        let registry = registry();
        let state = BridgeState::new(2);
        state.enqueue_write(registry.write("mode_all").unwrap());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.values.len(), 2);
        assert_eq!(snapshot.pending_action.as_deref(), Some("mode_all"));
        assert!(snapshot.last_cycle.is_none());
    }
}
