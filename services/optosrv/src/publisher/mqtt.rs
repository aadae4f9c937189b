//! MQTT telemetry publisher
//!
//! Values go to `{prefix}/status/json` (QoS 0, retained). A retained presence
//! flag `{prefix}/connected` is set to `true` on every connection, with a last
//! will of `false`. The rumqttc event loop runs in its own task and reconnects
//! on its own; publishing never awaits the broker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use optolink::Value;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{status_payload, TelemetrySink};
use crate::config::MqttConfig;
use crate::error::Result;

/// Queued requests between publishers and the event loop
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
    status_topic: String,
    presence_topic: String,
    connected: Arc<AtomicBool>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop. Must run inside a tokio
    /// runtime.
    pub fn start(config: &MqttConfig) -> Self {
        let status_topic = config.status_topic();
        let presence_topic = config.presence_topic();

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        options.set_last_will(LastWill::new(
            &presence_topic,
            "false",
            QoS::ExactlyOnce,
            true,
        ));

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(drive_event_loop(
            event_loop,
            client.clone(),
            presence_topic.clone(),
            Arc::clone(&connected),
        ));

        info!(
            "MQTT publisher: {}:{} as '{}', topic {}",
            config.host, config.port, config.client_id, status_topic
        );

        Self {
            client,
            status_topic,
            presence_topic,
            connected,
            event_loop: Mutex::new(Some(handle)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Clear the presence flag, disconnect cleanly and stop the event loop.
    pub async fn shutdown(&self) {
        if self.is_connected() {
            if let Err(e) =
                self.client
                    .try_publish(&self.presence_topic, QoS::AtLeastOnce, true, "false")
            {
                debug!("Failed to clear presence flag: {}", e);
            }
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!("Failed to queue MQTT disconnect: {}", e);
        }

        let handle = self.event_loop.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }
        info!("MQTT publisher stopped");
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    presence_topic: String,
    connected: Arc<AtomicBool>,
) {
    let mut failures: u32 = 0;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                failures = 0;
                connected.store(true, Ordering::Release);
                info!("MQTT connection established");
                if let Err(e) = client.try_publish(&presence_topic, QoS::AtLeastOnce, true, "true")
                {
                    warn!("Failed to publish presence flag: {}", e);
                }
            },
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Release);
                debug!("MQTT disconnect sent");
                break;
            },
            Ok(event) => trace!("MQTT event: {:?}", event),
            Err(e) => {
                let was_connected = connected.swap(false, Ordering::AcqRel);
                failures = failures.saturating_add(1);
                if was_connected {
                    warn!("MQTT connection lost: {}", e);
                } else if failures == 1 {
                    warn!("MQTT broker unreachable, retrying every {:?}: {}", RECONNECT_DELAY, e);
                } else {
                    debug!("MQTT reconnect attempt {} failed: {}", failures, e);
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            },
        }
    }
}

#[async_trait]
impl TelemetrySink for MqttPublisher {
    async fn publish(&self, name: &str, value: &Value) -> Result<()> {
        let payload = status_payload(name, value)?;
        self.client
            .try_publish(&self.status_topic, QoS::AtMostOnce, true, payload)?;
        Ok(())
    }
}
