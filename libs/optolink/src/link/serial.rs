//! Serial Link Implementation
//!
//! Optolink adapters show up as a plain serial device (usually a USB
//! converter). The line is 4800 baud, 8E2 and must not be shared.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

use super::Link;
use crate::error::{OptolinkError, Result};

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0")
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Parity ("None", "Even", "Odd")
    #[serde(default = "default_parity")]
    pub parity: String,
    /// Stop bits (1, 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Refuse to share the device with other processes
    #[serde(default = "default_exclusive")]
    pub exclusive: bool,
    /// Upper bound for a single frame write in milliseconds
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    4800
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "Even".to_string()
}

fn default_stop_bits() -> u8 {
    2
}

fn default_exclusive() -> bool {
    true
}

fn default_write_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            exclusive: default_exclusive(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(OptolinkError::config("Port path cannot be empty"));
        }

        if self.baud_rate == 0 {
            return Err(OptolinkError::config("Baud rate must be greater than zero"));
        }

        if ![5, 6, 7, 8].contains(&self.data_bits) {
            return Err(OptolinkError::config("Data bits must be 5, 6, 7, or 8"));
        }

        if ![1, 2].contains(&self.stop_bits) {
            return Err(OptolinkError::config("Stop bits must be 1 or 2"));
        }

        if !["None", "Even", "Odd"].contains(&self.parity.as_str()) {
            return Err(OptolinkError::config("Parity must be None, Even, or Odd"));
        }

        if self.write_timeout_ms == 0 {
            return Err(OptolinkError::config(
                "Write timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    fn parse_parity(&self) -> tokio_serial::Parity {
        match self.parity.as_str() {
            "Even" => tokio_serial::Parity::Even,
            "Odd" => tokio_serial::Parity::Odd,
            _ => tokio_serial::Parity::None,
        }
    }

    fn parse_data_bits(&self) -> tokio_serial::DataBits {
        match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    fn parse_stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }
}

/// Exclusive serial connection to the controller
#[derive(Debug)]
pub struct SerialLink {
    port: SerialStream,
    path: String,
    write_timeout: Duration,
}

impl SerialLink {
    /// Open and exclusively acquire the port. Failure is fatal.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        config.validate()?;

        debug!("Opening serial port: {}", config.port);

        let port = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(config.parse_data_bits())
            .parity(config.parse_parity())
            .stop_bits(config.parse_stop_bits())
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async();

        #[cfg_attr(not(unix), allow(unused_mut))]
        let mut port = port.map_err(|e| {
            let msg = format!("Failed to open serial port {}: {}", config.port, e);
            error!("{}", msg);
            OptolinkError::Connection(msg)
        })?;

        #[cfg(unix)]
        port.set_exclusive(config.exclusive).map_err(|e| {
            OptolinkError::Connection(format!(
                "Failed to acquire {} exclusively: {}",
                config.port, e
            ))
        })?;

        info!(
            "Opened serial port: {} ({} baud, {}{}{})",
            config.port,
            config.baud_rate,
            config.data_bits,
            config.parity.chars().next().unwrap_or('N'),
            config.stop_bits
        );

        Ok(Self::from_stream(port, &config.port, config.write_timeout()))
    }

    pub(crate) fn from_stream(
        port: SerialStream,
        path: impl Into<String>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            port,
            path: path.into(),
            write_timeout,
        }
    }
}

#[async_trait]
impl Link for SerialLink {
    fn name(&self) -> &str {
        &self.path
    }

    async fn read(&mut self, max: usize, window: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + window;
        let mut buffer = vec![0u8; max];
        let mut filled = 0;

        while filled < max {
            match timeout_at(deadline, self.port.read(&mut buffer[filled..])).await {
                Ok(Ok(0)) => {
                    let msg = format!("Serial port {} reached end of stream", self.path);
                    error!("{}", msg);
                    return Err(OptolinkError::io(msg));
                },
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Ok(Err(e)) => {
                    let msg = format!("Failed to read from {}: {}", self.path, e);
                    error!("{}", msg);
                    return Err(OptolinkError::io(msg));
                },
                // Window elapsed; whatever arrived so far is the answer
                Err(_) => break,
            }
        }

        buffer.truncate(filled);
        if !buffer.is_empty() {
            debug!(
                hex_data = %common::hex::encode_upper_spaced(&buffer),
                length = filled,
                direction = "recv",
                "[Serial Link] Raw frame"
            );
        }
        Ok(buffer)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let write_timeout = self.write_timeout;
        let port = &mut self.port;
        let send = async move {
            port.write_all(data).await?;
            port.flush().await
        };
        let result = timeout(write_timeout, send).await;

        match result {
            Ok(Ok(())) => {
                debug!(
                    hex_data = %common::hex::encode_upper_spaced(data),
                    length = data.len(),
                    direction = "send",
                    "[Serial Link] Raw frame"
                );
                Ok(())
            },
            Ok(Err(e)) => {
                let msg = format!("Failed to write to {}: {}", self.path, e);
                error!("{}", msg);
                Err(OptolinkError::io(msg))
            },
            Err(_) => {
                let msg = format!("Write timed out after {:?}", write_timeout);
                warn!("{}", msg);
                Err(OptolinkError::timeout(msg))
            },
        }
    }
}
