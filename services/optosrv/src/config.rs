//! Service configuration
//!
//! Layered with figment: built-in defaults, then the YAML file, then
//! `OPTOSRV_`-prefixed environment variables (`__` separates sections, e.g.
//! `OPTOSRV_SERIAL__PORT=/dev/ttyAMA0`).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use optolink::{CommandSetConfig, ProtocolTimings, SerialConfig};
use serde::{Deserialize, Serialize};

use crate::error::{OptoSrvError, Result};

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/optosrv.yaml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "OPTOSRV_";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub protocol: ProtocolTimings,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Command table; the built-in KW1 set when omitted
    #[serde(default)]
    pub commands: CommandSetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name", deserialize_with = "text::required")]
    pub name: String,
}

fn default_service_name() -> String {
    "optosrv".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// Telemetry broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mqtt_host", deserialize_with = "text::required")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id", deserialize_with = "text::required")]
    pub client_id: String,
    #[serde(default, deserialize_with = "text::optional")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "text::optional")]
    pub password: Option<String>,
    /// Root of every published topic
    #[serde(default = "default_topic_prefix", deserialize_with = "text::required")]
    pub topic_prefix: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "optosrv".to_string()
}

fn default_topic_prefix() -> String {
    "Viessmann".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            topic_prefix: default_topic_prefix(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// `{prefix}/status/json`
    pub fn status_topic(&self) -> String {
        format!("{}/status/json", self.topic_prefix)
    }

    /// `{prefix}/connected`
    pub fn presence_topic(&self) -> String {
        format!("{}/connected", self.topic_prefix)
    }
}

/// Control inbox / status page settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Status page auto-refresh interval
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_refresh_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Daily log files are written here when set
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            json: false,
        }
    }
}

/// Free-text settings that may arrive as numbers.
///
/// Figment parses environment values, so `OPTOSRV_MQTT__PASSWORD=123456`
/// reaches serde as an integer. Quote the value (`'"007"'`) to keep leading
/// zeros.
mod text {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    impl From<Scalar> for String {
        fn from(value: Scalar) -> Self {
            match value {
                Scalar::Text(s) => s,
                Scalar::Unsigned(n) => n.to_string(),
                Scalar::Signed(n) => n.to_string(),
                Scalar::Float(n) => n.to_string(),
                Scalar::Bool(b) => b.to_string(),
            }
        }
    }

    pub fn required<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Scalar::deserialize(deserializer).map(String::from)
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; without one, [`DEFAULT_CONFIG_PATH`] is
    /// used when present and silently skipped otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(OptoSrvError::config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Yaml::file(path));
            },
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    figment = figment.merge(Yaml::file(default_path));
                }
            },
        }

        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.serial
            .validate()
            .map_err(|e| OptoSrvError::config(format!("serial: {}", e)))?;
        self.protocol
            .validate()
            .map_err(|e| OptoSrvError::config(format!("protocol: {}", e)))?;

        if self.mqtt.enabled {
            if self.mqtt.host.trim().is_empty() {
                return Err(OptoSrvError::config("mqtt: host cannot be empty"));
            }
            if self.mqtt.port == 0 {
                return Err(OptoSrvError::config("mqtt: port must be greater than zero"));
            }
            if self.mqtt.client_id.is_empty() || self.mqtt.client_id.starts_with(' ') {
                return Err(OptoSrvError::config(
                    "mqtt: client_id cannot be empty or start with a space",
                ));
            }
            let prefix = &self.mqtt.topic_prefix;
            if prefix.is_empty() || prefix.contains(['#', '+']) {
                return Err(OptoSrvError::config(
                    "mqtt: topic_prefix must be non-empty and free of wildcards",
                ));
            }
            if self.mqtt.keep_alive_secs < 5 {
                return Err(OptoSrvError::config(
                    "mqtt: keep_alive_secs must be at least 5",
                ));
            }
        }

        if self.api.enabled {
            self.api.bind.parse::<SocketAddr>().map_err(|e| {
                OptoSrvError::config(format!("api: invalid bind '{}': {}", self.api.bind, e))
            })?;
            if self.api.refresh_secs == 0 {
                return Err(OptoSrvError::config(
                    "api: refresh_secs must be greater than zero",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 4800);
        assert_eq!(config.protocol.handshake_timeout_ms, 3000);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.status_topic(), "Viessmann/status/json");
        assert_eq!(config.mqtt.presence_topic(), "Viessmann/connected");
        assert_eq!(config.api.refresh_secs, 30);
        assert_eq!(config.commands.reads.len(), 18);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
serial:
  port: /dev/ttyAMA0
protocol:
  drain_timeout_ms: 2500
mqtt:
  host: broker.local
  topic_prefix: Heating
api:
  bind: 127.0.0.1:9090
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        // Untouched keys keep their defaults
        assert_eq!(config.serial.baud_rate, 4800);
        assert_eq!(config.protocol.drain_timeout_ms, 2500);
        assert_eq!(config.protocol.command_timeout_ms, 1000);
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.status_topic(), "Heating/status/json");
        assert_eq!(config.api.bind, "127.0.0.1:9090");
        assert_eq!(config.commands.writes.len(), 8);
    }

    #[test]
    fn test_load_custom_command_set() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
commands:
  reads:
    - name: device
      address: "00F8"
      length: 2
      unit: deviceType
  writes: []
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.commands.reads.len(), 1);
        assert!(config.commands.writes.is_empty());
    }

    #[test]
    fn test_numeric_env_values_stay_text() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("OPTOSRV_MQTT__PASSWORD", "123456");
            jail.set_env("OPTOSRV_MQTT__USERNAME", "42");
            jail.set_env("OPTOSRV_MQTT__CLIENT_ID", "7001");
            jail.set_env("OPTOSRV_MQTT__TOPIC_PREFIX", "2024");
            jail.set_env("OPTOSRV_SERVICE__NAME", "1");
            jail.set_env("OPTOSRV_MQTT__PORT", "1884");

            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.mqtt.password.as_deref(), Some("123456"));
            assert_eq!(config.mqtt.username.as_deref(), Some("42"));
            assert_eq!(config.mqtt.client_id, "7001");
            assert_eq!(config.mqtt.status_topic(), "2024/status/json");
            assert_eq!(config.service.name, "1");
            assert_eq!(config.mqtt.port, 1884);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_credentials_without_password() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "optosrv.yaml",
                "mqtt:\n  username: heating\n  client_id: boiler-1\n",
            )?;

            let config =
                AppConfig::load(Some(Path::new("optosrv.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.mqtt.username.as_deref(), Some("heating"));
            assert!(config.mqtt.password.is_none());
            assert_eq!(config.mqtt.client_id, "boiler-1");
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/optosrv.yaml"))).unwrap_err();
        assert!(matches!(err, OptoSrvError::Config(_)));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.mqtt.topic_prefix = "Viessmann/#".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.bind = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.serial.parity = "Mark".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("serial"));

        // Disabled sections are not checked
        let mut config = AppConfig::default();
        config.mqtt.enabled = false;
        config.mqtt.host = String::new();
        assert!(config.validate().is_ok());
    }
}
