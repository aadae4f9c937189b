//! Protocol Engine
//!
//! KW1 handshake state machine and the command sub-protocol on top of a
//! [`Link`].
//!
//! ```text
//! IDLE --read 1 byte--> AWAIT_ACK --0x05 / send 0x01--> ACTIVE --> DRAIN --> IDLE
//!                           |                                        ^
//!                           +----- timeout or any other byte --------+
//! ```
//!
//! Commands may only be issued while the window is `ACTIVE`; the controller
//! closes it on its own after a short idle period, which is why the drain
//! phase exists.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::Value;
use crate::error::{OptolinkError, Result};
use crate::link::Link;
use crate::registry::{CommandSpec, Opcode, WriteCommand};

/// Sent by the controller to offer a command window
pub const SYNC_BYTE: u8 = 0x05;
/// Our answer to [`SYNC_BYTE`], claims the window
pub const CONTINUE_BYTE: u8 = 0x01;
/// Write acknowledgement status
pub const WRITE_OK: u8 = 0x00;

/// Protocol pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolTimings {
    /// Wait for the sync byte
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Per-command response window
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Trailing-traffic discard window
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Upper bound of bytes discarded per drain
    #[serde(default = "default_drain_max_bytes")]
    pub drain_max_bytes: usize,
}

fn default_handshake_timeout_ms() -> u64 {
    3000
}

fn default_command_timeout_ms() -> u64 {
    1000
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_drain_max_bytes() -> usize {
    100
}

impl Default for ProtocolTimings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: default_handshake_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            drain_max_bytes: default_drain_max_bytes(),
        }
    }
}

impl ProtocolTimings {
    pub fn validate(&self) -> Result<()> {
        if self.handshake_timeout_ms == 0
            || self.command_timeout_ms == 0
            || self.drain_timeout_ms == 0
        {
            return Err(OptolinkError::config(
                "Protocol timeouts must be greater than zero",
            ));
        }
        if self.drain_max_bytes == 0 {
            return Err(OptolinkError::config(
                "Drain byte budget must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Handshake state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPhase {
    #[default]
    Idle,
    AwaitAck,
    Active,
    Drain,
}

/// KW1 protocol engine, sole owner of the link
#[derive(Debug)]
pub struct OptolinkEngine<L: Link> {
    link: L,
    timings: ProtocolTimings,
    phase: LinkPhase,
}

impl<L: Link> OptolinkEngine<L> {
    pub fn new(link: L, timings: ProtocolTimings) -> Self {
        Self {
            link,
            timings,
            phase: LinkPhase::Idle,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// IDLE -> AWAIT_ACK -> ACTIVE | DRAIN
    ///
    /// Returns `Ok(true)` when the window is open. A missed window is the
    /// normal outcome of a busy or sleeping controller and is not an error.
    pub async fn handshake(&mut self) -> Result<bool> {
        self.phase = LinkPhase::AwaitAck;

        let received = match self.link.read(1, self.timings.handshake_timeout()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.phase = LinkPhase::Drain;
                return Err(e);
            },
        };

        match received.first() {
            Some(&SYNC_BYTE) => {
                if let Err(e) = self.link.write(&[CONTINUE_BYTE]).await {
                    self.phase = LinkPhase::Drain;
                    return Err(e);
                }
                trace!(link = self.link.name(), "Command window open");
                self.phase = LinkPhase::Active;
                Ok(true)
            },
            Some(other) => {
                debug!(
                    link = self.link.name(),
                    "Expected sync byte, got 0x{:02X}; skipping window", other
                );
                self.phase = LinkPhase::Drain;
                Ok(false)
            },
            None => {
                debug!(
                    link = self.link.name(),
                    "No sync byte within {:?}",
                    self.timings.handshake_timeout()
                );
                self.phase = LinkPhase::Drain;
                Ok(false)
            },
        }
    }

    /// Execute one read command and decode its response.
    ///
    /// A short or missing response is [`OptolinkError::ShortRead`]; decode
    /// problems come back as [`Value::Invalid`].
    pub async fn read_command(&mut self, spec: &CommandSpec) -> Result<Value> {
        self.ensure_active(spec)?;
        if spec.opcode != Opcode::Read {
            return Err(OptolinkError::protocol(format!(
                "{} is not a read command",
                spec.name
            )));
        }

        self.link.write(&spec.header()).await?;

        let expected = usize::from(spec.length);
        let raw = self
            .link
            .read(expected, self.timings.command_timeout())
            .await?;
        if raw.len() < expected {
            return Err(OptolinkError::ShortRead {
                expected,
                received: raw.len(),
            });
        }

        let value = spec.unit.decode(&raw);
        trace!(command = %spec, value = %value, "Read complete");
        Ok(value)
    }

    /// Execute one write command and check its status byte.
    pub async fn write_command(&mut self, command: &WriteCommand) -> Result<()> {
        self.ensure_active(&command.spec)?;

        self.link.write(command.frame()).await?;

        let status = self
            .link
            .read(1, self.timings.command_timeout())
            .await?;
        match status.first() {
            Some(&WRITE_OK) => {
                debug!(action = %command.id, "Write acknowledged");
                Ok(())
            },
            Some(&code) => Err(OptolinkError::WriteRejected(code)),
            None => Err(OptolinkError::timeout(format!(
                "no acknowledgement for {} within {:?}",
                command.id,
                self.timings.command_timeout()
            ))),
        }
    }

    /// DRAIN -> IDLE. Returns the number of discarded bytes.
    pub async fn drain(&mut self) -> Result<usize> {
        self.phase = LinkPhase::Drain;
        let result = self
            .link
            .read(self.timings.drain_max_bytes, self.timings.drain_timeout())
            .await;
        self.phase = LinkPhase::Idle;

        let discarded = result?.len();
        if discarded > 0 {
            trace!(bytes = discarded, "Drained trailing traffic");
        }
        Ok(discarded)
    }

    fn ensure_active(&self, spec: &CommandSpec) -> Result<()> {
        if self.phase != LinkPhase::Active {
            return Err(OptolinkError::protocol(format!(
                "{} issued outside an open window ({:?})",
                spec.name, self.phase
            )));
        }
        Ok(())
    }
}
