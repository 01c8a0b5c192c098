//! MQTT client, event loop and outbound pump

use crate::{topics, GatewayError, InboundMessage, Outbound, RetryPolicy};
use alarm::{AlarmWindow, ALARM_TIME_FORMAT};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Requests buffered between the client handle and the event loop
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Broker connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM trust root; enables TLS when set
    pub ca_cert_path: Option<PathBuf>,
    /// Client id prefix, a random suffix is appended per connection
    pub client_id_prefix: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            ca_cert_path: None,
            client_id_prefix: "smart-alarm".to_string(),
            keep_alive_secs: 30,
        }
    }
}

impl MqttConfig {
    fn options(&self) -> Result<MqttOptions, GatewayError> {
        let client_id = format!("{}-{}", self.client_id_prefix, Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs.max(5)));

        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }

        if let Some(path) = &self.ca_cert_path {
            let ca = std::fs::read(path).map_err(|e| {
                GatewayError::Connection(format!("cannot read CA certificate {}: {}", path.display(), e))
            })?;
            options.set_transport(Transport::tls(ca, None, None));
        }

        Ok(options)
    }
}

/// MQTT gateway factory
pub struct MqttGateway;

impl MqttGateway {
    /// Build the client. Nothing touches the network until the returned
    /// driver is run.
    pub fn connect(
        config: &MqttConfig,
        policy: RetryPolicy,
    ) -> Result<(Publisher, EventLoopDriver), GatewayError> {
        let options = config.options()?;
        info!(
            "MQTT client {} targeting {}:{}",
            options.client_id(),
            config.host,
            config.port
        );

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let (connected_tx, connected_rx) = watch::channel(false);
        let publisher = Publisher {
            client: client.clone(),
            connected: connected_rx,
            policy,
        };
        let driver = EventLoopDriver {
            client,
            eventloop,
            connected: connected_tx,
            policy,
        };
        Ok((publisher, driver))
    }
}

/// Cloneable publishing handle
#[derive(Clone)]
pub struct Publisher {
    client: AsyncClient,
    /// Broker session state, owned by the driver
    connected: watch::Receiver<bool>,
    policy: RetryPolicy,
}

impl Publisher {
    /// Publish with the gateway's retry policy. Each attempt waits up to
    /// one retry delay for a broker session, so a publish made while the
    /// broker is unreachable ends in `RetriesExhausted`.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), GatewayError> {
        let what = format!("publish to {}", topic);
        self.policy
            .run(&what, || self.publish_once(topic, &payload, retain))
            .await?;
        debug!("Published {} bytes to {}", payload.len(), topic);
        Ok(())
    }

    async fn publish_once(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), GatewayError> {
        self.wait_connected().await?;
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .await
            .map_err(|e| GatewayError::Publish(e.to_string()))
    }

    async fn wait_connected(&self) -> Result<(), GatewayError> {
        let mut connected = self.connected.clone();
        let waited = tokio::time::timeout(self.policy.retry_delay, connected.wait_for(|up| *up))
            .await
            .map(|state| state.is_ok());
        match waited {
            Ok(true) => Ok(()),
            Ok(false) => Err(GatewayError::Connection("MQTT event loop stopped".to_string())),
            Err(_) => Err(GatewayError::Connection("not connected to broker".to_string())),
        }
    }

    /// Whether the driver currently holds a broker session
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub async fn publish_outbound(&self, message: &Outbound) -> Result<(), GatewayError> {
        self.publish(message.topic(), message.payload(), message.retain())
            .await
    }

    /// Publish an alarm-set message for the device and for our own subscriber
    pub async fn publish_alarm(&self, window: &AlarmWindow) -> Result<(), GatewayError> {
        let topic = alarm_topic(window);
        self.publish(&topic, window.to_payload().into_bytes(), false)
            .await?;
        info!("Alarm published on {}", topic);
        Ok(())
    }
}

/// `setalarm/<start>-<end>`
pub fn alarm_topic(window: &AlarmWindow) -> String {
    format!(
        "{}{}-{}",
        topics::SET_ALARM_PREFIX,
        window.start.format(ALARM_TIME_FORMAT),
        window.end.format(ALARM_TIME_FORMAT)
    )
}

/// Owns the rumqttc event loop
pub struct EventLoopDriver {
    client: AsyncClient,
    eventloop: EventLoop,
    /// Set on ConnAck, cleared on any poll error or exit
    connected: watch::Sender<bool>,
    policy: RetryPolicy,
}

impl EventLoopDriver {
    /// Poll the connection, forwarding every inbound publish in arrival
    /// order. Returns an error once the connection has failed more times in
    /// a row than the retry policy allows, or `Ok` when the receiver is gone.
    pub async fn run(mut self, inbound_tx: mpsc::Sender<InboundMessage>) -> Result<(), GatewayError> {
        let mut consecutive_failures = 0u32;

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    consecutive_failures = 0;
                    self.connected.send_replace(true);
                    info!("Connected to MQTT broker ({:?})", ack.code);
                    self.subscribe();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                    if inbound_tx.send(message).await.is_err() {
                        info!("Inbound receiver closed, stopping MQTT event loop");
                        self.connected.send_replace(false);
                        return Ok(());
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!("Subscription acknowledged: {:?}", ack.return_codes);
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.send_replace(false);
                    consecutive_failures += 1;
                    if !self.policy.allows(consecutive_failures) {
                        error!(
                            "MQTT connection lost for good after {} attempts: {}",
                            consecutive_failures, e
                        );
                        return Err(GatewayError::RetriesExhausted {
                            attempts: consecutive_failures,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(
                        "MQTT connection error (attempt {}/{}): {}",
                        consecutive_failures,
                        self.policy.max_attempts(),
                        e
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }

    // The event loop is what drains the request channel, so a blocking
    // subscribe here could wait on itself.
    fn subscribe(&self) {
        for filter in topics::SUBSCRIPTIONS {
            match self.client.try_subscribe(filter, QoS::AtLeastOnce) {
                Ok(()) => info!("Subscribed to {}", filter),
                Err(e) => error!("Failed to subscribe to {}: {}", filter, e),
            }
        }
    }
}

/// Forward queued outbound messages to the broker in order until the queue
/// closes. A message that cannot be delivered is logged and skipped.
pub async fn run_outbound(publisher: Publisher, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = publisher.publish_outbound(&message).await {
            error!("Dropping {} message: {}", message.topic(), e);
        }
    }
    debug!("Outbound queue closed");
}
