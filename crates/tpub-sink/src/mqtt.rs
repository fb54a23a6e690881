//! rumqttc-backed sink.
//!
//! # Lifecycle
//! 1. [`MqttSink::start`] builds the client and spawns the event loop task.
//!    Nothing is awaited; the first connection attempt happens on that task.
//! 2. [`MqttSink::connect`] waits for the first `ConnAck`. A timeout is not
//!    fatal: the loop keeps reconnecting and publishes fail fast until then.
//! 3. [`PublishSink::publish`] is refused while the link is down, so a broker
//!    outage surfaces as a failed cycle instead of requests silently queueing.
//! 4. [`MqttSink::shutdown`] sends `DISCONNECT` and stops the task.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{ConnectError, PublishError, PublishIntent, PublishSink};

/// Delay between failed connection attempts.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Bound on requests buffered between callers and the event loop.
const REQUEST_CHANNEL_CAP: usize = 128;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Largest packet MQTT v3.1.1 can encode (remaining length 268_435_455).
pub const MQTT_MAX_PACKET_SIZE: usize = 268_435_455;

/// Broker session state as observed by the event loop task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// No `ConnAck` seen yet.
    Connecting,
    Connected,
    /// Session lost; the loop is retrying.
    Disconnected,
    /// Event loop has exited.
    Closed,
}

#[derive(Debug, Clone)]
pub struct MqttSinkOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub publish_timeout: Duration,
    /// Upper bound on one encoded packet, in either direction. Clamped to
    /// [`MQTT_MAX_PACKET_SIZE`].
    pub max_packet_size: usize,
}

pub struct MqttSink {
    client: AsyncClient,
    link: watch::Receiver<LinkState>,
    task: JoinHandle<()>,
    broker: String,
    publish_timeout: Duration,
    max_packet_size: usize,
}

impl MqttSink {
    /// Build the client and spawn its event loop. Must be called inside a tokio runtime.
    pub fn start(opts: MqttSinkOptions) -> Self {
        let broker = format!("{}:{}", opts.host, opts.port);

        let mut mqtt_opts = MqttOptions::new(opts.client_id.clone(), opts.host, opts.port);
        mqtt_opts.set_keep_alive(opts.keep_alive);
        mqtt_opts.set_clean_session(true);
        // The event loop silently drops packets over this bound; `publish`
        // checks it up front.
        let max_packet_size = opts.max_packet_size.min(MQTT_MAX_PACKET_SIZE);
        mqtt_opts.set_max_packet_size(max_packet_size, max_packet_size);

        let (client, eventloop) = AsyncClient::new(mqtt_opts, REQUEST_CHANNEL_CAP);
        let (link_tx, link_rx) = watch::channel(LinkState::Connecting);

        info!(broker = %broker, client_id = %opts.client_id, "connecting to MQTT broker");
        let task = tokio::spawn(drive_event_loop(eventloop, link_tx, broker.clone()));

        Self {
            client,
            link: link_rx,
            task,
            broker,
            publish_timeout: opts.publish_timeout,
            max_packet_size,
        }
    }

    /// Wait up to `timeout` for the broker to acknowledge the session.
    pub async fn connect(&self, timeout: Duration) -> Result<(), ConnectError> {
        let mut link = self.link.clone();
        let waited = tokio::time::timeout(
            timeout,
            link.wait_for(|s| matches!(s, LinkState::Connected | LinkState::Closed)),
        )
        .await;

        match waited {
            Err(_) => Err(ConnectError::Timeout {
                broker: self.broker.clone(),
                after: timeout,
            }),
            Ok(Ok(state)) if *state == LinkState::Connected => Ok(()),
            Ok(_) => Err(ConnectError::Closed {
                broker: self.broker.clone(),
            }),
        }
    }

    pub fn link_state(&self) -> LinkState {
        *self.link.borrow()
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Send `DISCONNECT`, give the event loop a moment to flush it, then stop it.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "disconnect request not accepted");
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
        }
        info!(broker = %self.broker, "MQTT sink shut down");
    }
}

#[async_trait::async_trait]
impl PublishSink for MqttSink {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn publish(&self, intent: &PublishIntent) -> Result<(), PublishError> {
        if self.link_state() != LinkState::Connected {
            return Err(PublishError::NotConnected {
                topic: intent.topic.clone(),
            });
        }

        let size = intent.encoded_len();
        if size > self.max_packet_size {
            return Err(PublishError::Client {
                topic: intent.topic.clone(),
                message: format!(
                    "packet of {size} bytes exceeds the {} byte limit",
                    self.max_packet_size
                ),
            });
        }

        let request = self.client.publish(
            intent.topic.clone(),
            intent.qos.into(),
            intent.retain,
            intent.payload.clone(),
        );

        match tokio::time::timeout(self.publish_timeout, request).await {
            Err(_) => Err(PublishError::Timeout {
                topic: intent.topic.clone(),
                after: self.publish_timeout,
            }),
            Ok(Err(e)) => Err(PublishError::Client {
                topic: intent.topic.clone(),
                message: e.to_string(),
            }),
            Ok(Ok(())) => Ok(()),
        }
    }
}

/// Poll the event loop forever. Polling is what drives keep-alive pings,
/// acknowledgements and reconnects.
async fn drive_event_loop(
    mut eventloop: EventLoop,
    link: watch::Sender<LinkState>,
    broker: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    info!(broker = %broker, "connected to MQTT broker");
                    link.send_replace(LinkState::Connected);
                } else {
                    warn!(broker = %broker, code = ?ack.code, "broker refused connection");
                    link.send_replace(LinkState::Disconnected);
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(broker = %broker, "disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let previous = link.send_replace(LinkState::Disconnected);
                if previous == LinkState::Connected {
                    warn!(
                        broker = %broker,
                        error = %e,
                        "lost connection to MQTT broker; reconnecting"
                    );
                } else {
                    warn!(broker = %broker, error = %e, "MQTT connection attempt failed; retrying");
                }
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
    link.send_replace(LinkState::Closed);
}
