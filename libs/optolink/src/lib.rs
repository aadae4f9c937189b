//! Optolink KW1 protocol library
//!
//! Talks to Viessmann-style heating controllers over the optolink serial
//! interface using the KW1 dialect:
//!
//! - [`codec`]: raw bytes <-> typed [`Value`]s
//! - [`registry`]: immutable read/write command table
//! - [`link`]: exclusive byte transport ([`SerialLink`], [`MockLink`] for tests)
//! - [`engine`]: handshake state machine and command sub-protocol

pub mod codec;
pub mod engine;
pub mod error;
pub mod link;
pub mod registry;

pub use codec::{DecodeFault, SetPoint, Unit, Value};
pub use engine::{LinkPhase, OptolinkEngine, ProtocolTimings};
pub use error::{OptolinkError, Result};
pub use link::Link;
pub use registry::{
    CommandRegistry, CommandSetConfig, CommandSpec, Opcode, ReadCommandConfig, WriteCommand,
    WriteCommandConfig,
};

#[cfg(feature = "serial")]
pub use link::serial::{SerialConfig, SerialLink};

#[cfg(any(test, feature = "test-utils"))]
pub use link::mock::MockLink;
