//! Telemetry publishing
//!
//! The poll loop hands every read command's latest value to a
//! [`TelemetrySink`] once per cycle. Publishing is best-effort: a failed
//! publish is logged by the caller and never retried.

mod mqtt;

use async_trait::async_trait;
use optolink::Value;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{OptoSrvError, Result};

pub use mqtt::MqttPublisher;

/// Destination for decoded values
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn publish(&self, name: &str, value: &Value) -> Result<()>;
}

/// `{"<name>": <value>}`
pub fn status_payload(name: &str, value: &Value) -> Result<String> {
    let value = serde_json::to_value(value)
        .map_err(|e| OptoSrvError::mqtt(format!("cannot encode {}: {}", name, e)))?;
    let mut payload = Map::with_capacity(1);
    payload.insert(name.to_string(), value);
    Ok(JsonValue::Object(payload).to_string())
}

/// Sink used when no broker is configured: values only go to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn publish(&self, name: &str, value: &Value) -> Result<()> {
        debug!(name, value = %value, "Telemetry");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use optolink::DecodeFault;
    use std::borrow::Cow;

    #[test]
    fn test_status_payload() {
        assert_eq!(
            status_payload("outside_temp", &Value::Float(-1.5)).unwrap(),
            r#"{"outside_temp":-1.5}"#
        );
        assert_eq!(
            status_payload("burner_starts", &Value::Integer(1234)).unwrap(),
            r#"{"burner_starts":1234}"#
        );
        assert_eq!(
            status_payload("operating_mode", &Value::Label(Cow::Borrowed("Normal"))).unwrap(),
            r#"{"operating_mode":"Normal"}"#
        );
        assert_eq!(
            status_payload("dhw_temp", &Value::Unavailable).unwrap(),
            r#"{"dhw_temp":null}"#
        );
        assert_eq!(
            status_payload("operating_mode", &Value::Invalid(DecodeFault::UnmappedMode(9)))
                .unwrap(),
            r#"{"operating_mode":"error"}"#
        );
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        assert!(LogSink.publish("x", &Value::Unavailable).await.is_ok());
    }
}
