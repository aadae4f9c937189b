//! Poll Scheduler
//!
//! The outer loop. Each cycle: handshake, every read command in registry
//! order, at most one pending write, publish every latest value, drain.
//! Per-command and per-publish faults stay inside the cycle; only a hard link
//! fault ends [`PollScheduler::run`].

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use optolink::{CommandRegistry, Link, OptolinkEngine};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::publisher::TelemetrySink;
use crate::state::BridgeState;

/// Outcome of the write executed in a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub action: String,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one poll cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    /// Whether the controller offered a command window
    pub window_opened: bool,
    pub reads_ok: usize,
    pub reads_failed: usize,
    /// Reads that arrived but could not be decoded
    pub decode_errors: usize,
    pub write: Option<WriteOutcome>,
    pub published: usize,
    pub publish_failures: usize,
    pub drained_bytes: usize,
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(cycle: u64) -> Self {
        Self {
            cycle,
            started_at: Utc::now(),
            window_opened: false,
            reads_ok: 0,
            reads_failed: 0,
            decode_errors: 0,
            write: None,
            published: 0,
            publish_failures: 0,
            drained_bytes: 0,
            duration_ms: 0,
        }
    }
}

pub struct PollScheduler<L: Link> {
    engine: OptolinkEngine<L>,
    registry: Arc<CommandRegistry>,
    state: Arc<BridgeState>,
    sink: Arc<dyn TelemetrySink>,
    cycle: u64,
}

impl<L: Link> PollScheduler<L> {
    pub fn new(
        engine: OptolinkEngine<L>,
        registry: Arc<CommandRegistry>,
        state: Arc<BridgeState>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            engine,
            registry,
            state,
            sink,
            cycle: 0,
        }
    }

    /// Poll until a fatal link fault. Never returns `Ok`.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Polling {} read command(s) on {}",
            self.registry.reads().len(),
            self.engine.link().name()
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Poll loop stopped: {}", e);
                return Err(e);
            }
        }
    }

    /// Execute one full cycle and record its report in the shared state.
    ///
    /// Returns `Err` only for fatal faults; everything else is logged and
    /// counted in the report.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let started = Instant::now();
        let mut report = CycleReport::new(self.cycle);

        report.window_opened = match self.engine.handshake().await {
            Ok(open) => open,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Handshake failed: {}", e);
                false
            },
        };

        if report.window_opened {
            self.execute_reads(&mut report).await?;
            self.execute_pending_write(&mut report).await?;
        }

        self.publish_all(&mut report).await;

        match self.engine.drain().await {
            Ok(bytes) => report.drained_bytes = bytes,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => debug!("Drain failed: {}", e),
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            cycle = report.cycle,
            window = report.window_opened,
            reads_ok = report.reads_ok,
            reads_failed = report.reads_failed,
            publish_failures = report.publish_failures,
            duration_ms = report.duration_ms,
            "Cycle complete"
        );
        self.state.record_cycle(report.clone());
        Ok(report)
    }

    async fn execute_reads(&mut self, report: &mut CycleReport) -> Result<()> {
        for (index, spec) in self.registry.reads().iter().enumerate() {
            match self.engine.read_command(spec).await {
                Ok(value) => {
                    if value.is_invalid() {
                        warn!(command = %spec.name, "Undecodable response: {}", value);
                        report.decode_errors += 1;
                    }
                    self.state.set_value(index, value);
                    report.reads_ok += 1;
                },
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    // Keep the stale value
                    warn!(command = %spec.name, "Read failed: {}", e);
                    report.reads_failed += 1;
                },
            }
        }
        Ok(())
    }

    async fn execute_pending_write(&mut self, report: &mut CycleReport) -> Result<()> {
        let Some(command) = self.state.take_pending() else {
            return Ok(());
        };

        let outcome = match self.engine.write_command(&command).await {
            Ok(()) => {
                info!(action = %command.id, "Control action executed");
                WriteOutcome {
                    action: command.id.clone(),
                    acknowledged: true,
                    error: None,
                }
            },
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(action = %command.id, "Write failed: {}", e);
                WriteOutcome {
                    action: command.id.clone(),
                    acknowledged: false,
                    error: Some(e.to_string()),
                }
            },
        };
        report.write = Some(outcome);
        Ok(())
    }

    async fn publish_all(&self, report: &mut CycleReport) {
        let values = self.state.values();
        for (spec, value) in self.registry.reads().iter().zip(values.iter()) {
            match self.sink.publish(&spec.name, value).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    warn!(command = %spec.name, "Publish failed: {}", e);
                    report.publish_failures += 1;
                },
            }
        }
    }
}
