use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// QoS
// ---------------------------------------------------------------------------

/// MQTT delivery guarantee. Every intent built by this workspace uses
/// `AtLeastOnce`; the other levels exist so adapters map the full range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<QoS> for rumqttc::QoS {
    fn from(q: QoS) -> Self {
        match q {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

// ---------------------------------------------------------------------------
// PublishIntent
// ---------------------------------------------------------------------------

/// One outbound publish.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PublishIntent {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
    pub qos: QoS,
}

impl PublishIntent {
    /// Retained QoS 1 publish of `payload` on `topic`.
    pub fn retained(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
            qos: QoS::AtLeastOnce,
        }
    }

    /// Retained empty publish: brokers drop the retained message for `topic`.
    pub fn clear(topic: impl Into<String>) -> Self {
        Self::retained(topic, Vec::new())
    }

    pub fn is_clear(&self) -> bool {
        self.retain && self.payload.is_empty()
    }

    /// Payload as text, lossily. For logs and assertions.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Size of the MQTT v3.1.1 PUBLISH packet this intent encodes to,
    /// fixed header included.
    pub fn encoded_len(&self) -> usize {
        let packet_id = if self.qos == QoS::AtMostOnce { 0 } else { 2 };
        let remaining = 2 + self.topic.len() + packet_id + self.payload.len();
        let length_bytes = match remaining {
            0..=127 => 1,
            128..=16_383 => 2,
            16_384..=2_097_151 => 3,
            _ => 4,
        };
        1 + length_bytes + remaining
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A single publish was not accepted by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// No live broker session.
    NotConnected { topic: String },
    /// The client did not accept the request in time.
    Timeout { topic: String, after: Duration },
    /// The client rejected the request (invalid topic, closed channel, ...).
    Client { topic: String, message: String },
}

impl PublishError {
    pub fn topic(&self) -> &str {
        match self {
            PublishError::NotConnected { topic }
            | PublishError::Timeout { topic, .. }
            | PublishError::Client { topic, .. } => topic,
        }
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::NotConnected { topic } => {
                write!(f, "publish to '{topic}' failed: not connected to broker")
            }
            PublishError::Timeout { topic, after } => {
                write!(f, "publish to '{topic}' timed out after {after:?}")
            }
            PublishError::Client { topic, message } => {
                write!(f, "publish to '{topic}' rejected by client: {message}")
            }
        }
    }
}

impl std::error::Error for PublishError {}

/// The initial broker session could not be confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// No `ConnAck` within the wait window. The event loop keeps retrying.
    Timeout { broker: String, after: Duration },
    /// The event loop has stopped; no further connection attempts will be made.
    Closed { broker: String },
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Timeout { broker, after } => {
                write!(f, "no connection to broker {broker} within {after:?}")
            }
            ConnectError::Closed { broker } => {
                write!(f, "event loop for broker {broker} is closed")
            }
        }
    }
}

impl std::error::Error for ConnectError {}
