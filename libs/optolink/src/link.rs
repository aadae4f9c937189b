//! Link Driver
//!
//! Byte-level access to the half-duplex optolink line. A link only moves
//! bytes; framing and the handshake live in [`crate::engine`].

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

/// Exclusive byte transport to the controller
///
/// `read` returning fewer bytes than requested (including none) is the normal
/// "nothing within the window" signal, not an error. Hard faults surface as
/// [`crate::OptolinkError::Io`] and are fatal to the caller.
#[async_trait]
pub trait Link: Send + Debug {
    /// Human-readable link name for logs
    fn name(&self) -> &str;

    /// Read up to `max` bytes, waiting at most `timeout` in total.
    async fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Write the whole frame.
    async fn write(&mut self, data: &[u8]) -> Result<()>;
}

