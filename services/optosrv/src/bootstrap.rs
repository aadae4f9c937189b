//! Service Bootstrap
//!
//! Command-line arguments, CLI overrides on top of the loaded configuration,
//! logging initialization and the `--validate` summary.

use std::path::PathBuf;

use clap::Parser;
use optolink::CommandRegistry;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{OptoSrvError, Result};

/// Command-line arguments for optosrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "optosrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Optolink heating controller to MQTT bridge",
    long_about = None
)]
pub struct Args {
    /// Configuration file (defaults to config/optosrv.yaml when present)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Serial device, overrides serial.port
    #[arg(short = 'p', long)]
    pub port: Option<String>,

    /// Bind address for the status page, overrides api.bind
    #[arg(short = 'b', long)]
    pub bind: Option<String>,

    /// Do not connect to the MQTT broker; values are only logged
    #[arg(long)]
    pub no_mqtt: bool,

    /// Validation mode - load configuration, build the command table and exit
    #[arg(long)]
    pub validate: bool,
}

impl Args {
    /// CLI flags win over file and environment
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(bind) = &self.bind {
            config.api.bind = bind.clone();
        }
        if self.no_mqtt {
            config.mqtt.enabled = false;
        }
    }
}

pub fn initialize_logging(config: &AppConfig) -> Result<()> {
    let log_config = common::logging::LogConfig {
        service_name: config.service.name.clone(),
        level: config.logging.level.clone(),
        log_dir: config.logging.dir.as_ref().map(PathBuf::from),
        enable_json: config.logging.json,
    };

    common::logging::init_with_config(log_config)
        .map_err(|e| OptoSrvError::config(format!("Failed to init logging: {}", e)))
}

/// Log what the service would run with
pub fn log_summary(config: &AppConfig, registry: &CommandRegistry) {
    info!(
        "Serial: {} @ {} baud, {}{}{}",
        config.serial.port,
        config.serial.baud_rate,
        config.serial.data_bits,
        config.serial.parity.chars().next().unwrap_or('N'),
        config.serial.stop_bits
    );
    info!("Read commands: {}", registry.reads().len());
    for spec in registry.reads() {
        info!("  {} - {}", spec, spec.description);
    }
    info!("Control actions: {}", registry.writes().len());
    for command in registry.writes() {
        info!(
            "  /{} -> {} payload {}",
            command.id,
            command.spec,
            common::hex::encode_upper_spaced(command.payload())
        );
    }
    if config.mqtt.enabled {
        info!(
            "MQTT: {}:{} topic {}",
            config.mqtt.host,
            config.mqtt.port,
            config.mqtt.status_topic()
        );
    } else {
        info!("MQTT: disabled");
    }
    if config.api.enabled {
        info!("API: http://{}/", config.api.bind);
    } else {
        info!("API: disabled");
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "optosrv",
            "--port",
            "/dev/ttyS1",
            "--bind",
            "127.0.0.1:8081",
            "--no-mqtt",
            "-l",
            "debug",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.serial.port, "/dev/ttyS1");
        assert_eq!(config.api.bind, "127.0.0.1:8081");
        assert!(!config.mqtt.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::try_parse_from(["optosrv", "--validate"]).unwrap();
        assert!(args.validate);
        assert!(args.config.is_none());

        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert!(config.mqtt.enabled);
    }
}
