//! tpub-sink
//!
//! Broker boundary for retained publishes.
//!
//! - [`PublishIntent`] is the only request shape: topic, payload, retain, QoS.
//!   A clear is an intent with an empty payload and `retain = true`.
//! - [`PublishSink`] is the adapter trait the reconciler drives.
//! - [`MqttSink`] talks to a real broker through `rumqttc`; its event loop
//!   runs on its own task and only shares the request channel and a
//!   connection flag with callers.
//! - [`MemorySink`] is a deterministic in-process broker for tests.

mod memory;
mod mqtt;
mod types;

pub use memory::MemorySink;
pub use mqtt::{LinkState, MqttSink, MqttSinkOptions, MQTT_MAX_PACKET_SIZE};
pub use types::{ConnectError, PublishError, PublishIntent, QoS};

/// Publish adapter contract.
///
/// `publish` is called sequentially from the cycle task, but implementations
/// must tolerate their own background I/O running concurrently.
#[async_trait::async_trait]
pub trait PublishSink: Send + Sync {
    /// Human-readable adapter name for logs (e.g. `"mqtt"`).
    fn name(&self) -> &'static str;

    /// Hand one intent to the broker. An error means the intent was not accepted.
    async fn publish(&self, intent: &PublishIntent) -> Result<(), PublishError>;
}
