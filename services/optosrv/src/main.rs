//! Optolink bridge service
//!
//! Owns the serial link for the process lifetime. Exits non-zero when the
//! link fails hard so a supervisor can restart it.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use optolink::{CommandRegistry, OptolinkEngine, SerialLink};
use optosrv::{
    api::{self, AppState},
    bootstrap::{self, Args},
    config::AppConfig,
    publisher::{LogSink, MqttPublisher, TelemetrySink},
    scheduler::PollScheduler,
    state::BridgeState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);

    bootstrap::initialize_logging(&config)?;
    config.validate().context("Invalid configuration")?;

    let registry =
        Arc::new(CommandRegistry::build(&config.commands).context("Invalid command table")?);

    if args.validate {
        bootstrap::log_summary(&config, &registry);
        info!("Validation completed successfully");
        return Ok(());
    }

    info!(
        "Starting {} v{}",
        config.service.name,
        env!("CARGO_PKG_VERSION")
    );

    let state = Arc::new(BridgeState::new(registry.reads().len()));

    let link = SerialLink::open(&config.serial).context("Failed to open optolink")?;
    let engine = OptolinkEngine::new(link, config.protocol);

    let mqtt = if config.mqtt.enabled {
        Some(Arc::new(MqttPublisher::start(&config.mqtt)))
    } else {
        info!("MQTT disabled, values are only logged");
        None
    };
    let sink: Arc<dyn TelemetrySink> = match &mqtt {
        Some(publisher) => Arc::clone(publisher) as Arc<dyn TelemetrySink>,
        None => Arc::new(LogSink),
    };

    if config.api.enabled {
        let listener = TcpListener::bind(&config.api.bind)
            .await
            .with_context(|| format!("Failed to bind {}", config.api.bind))?;
        let app = api::create_routes(AppState {
            state: Arc::clone(&state),
            registry: Arc::clone(&registry),
            refresh_secs: config.api.refresh_secs,
        });
        info!("Status page listening on http://{}/", config.api.bind);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("API server error: {}", e);
            }
        });
    }

    let mut scheduler = PollScheduler::new(engine, registry, state, sink);

    let outcome = tokio::select! {
        result = scheduler.run() => result,
        signal = common::shutdown::wait_for_shutdown() => {
            info!("{} received, shutting down", signal);
            Ok(())
        }
    };

    if let Some(publisher) = mqtt {
        publisher.shutdown().await;
    }

    outcome.context("Optolink poll loop failed")?;
    info!("Service stopped");
    Ok(())
}
