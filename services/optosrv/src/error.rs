//! Error handling for the optolink bridge service

use optolink::OptolinkError;
use thiserror::Error;

/// Bridge service error type
#[derive(Error, Debug, Clone)]
pub enum OptoSrvError {
    /// Protocol engine, link or command-table errors
    #[error(transparent)]
    Optolink(#[from] OptolinkError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telemetry channel errors
    #[error("MQTT error: {0}")]
    Mqtt(String),
}

/// Result type alias for the bridge service
pub type Result<T> = std::result::Result<T, OptoSrvError>;

impl OptoSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        OptoSrvError::Config(msg.into())
    }

    pub fn mqtt(msg: impl Into<String>) -> Self {
        OptoSrvError::Mqtt(msg.into())
    }

    /// True when the poll loop cannot continue
    pub fn is_fatal(&self) -> bool {
        match self {
            OptoSrvError::Optolink(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl From<figment::Error> for OptoSrvError {
    fn from(err: figment::Error) -> Self {
        OptoSrvError::Config(err.to_string())
    }
}

impl From<rumqttc::ClientError> for OptoSrvError {
    fn from(err: rumqttc::ClientError) -> Self {
        OptoSrvError::Mqtt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_follows_link_classification() {
        let fatal: OptoSrvError = OptolinkError::io("unplugged").into();
        assert!(fatal.is_fatal());

        let local: OptoSrvError = OptolinkError::WriteRejected(0x15).into();
        assert!(!local.is_fatal());

        assert!(!OptoSrvError::mqtt("queue full").is_fatal());
        assert!(!OptoSrvError::config("bad").is_fatal());
    }

    #[test]
    fn test_transparent_display() {
        let err: OptoSrvError = OptolinkError::WriteRejected(0x15).into();
        assert_eq!(err.to_string(), "Write rejected with status 0x15");
    }
}
