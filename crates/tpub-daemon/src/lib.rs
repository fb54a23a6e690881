//! tpub-daemon
//!
//! Process wiring for the table → retained-topic publisher. The binary in
//! `main.rs` stays thin: it loads settings, builds the MySQL source, the MQTT
//! sink and the JSON tracking store, and hands them to [`CycleDriver`].

pub mod driver;

pub use driver::{CycleDriver, CycleReport, DriverPhase, DriverTiming};

use tpub_config::{BrokerSettings, Settings};
use tpub_reconcile::TopicScheme;
use tpub_sink::MqttSinkOptions;

pub fn sink_options(broker: &BrokerSettings) -> MqttSinkOptions {
    MqttSinkOptions {
        host: broker.host.clone(),
        port: broker.port,
        client_id: broker.client_id.clone(),
        keep_alive: broker.keep_alive,
        publish_timeout: broker.publish_timeout,
        max_packet_size: broker.max_packet_size,
    }
}

pub fn driver_timing(settings: &Settings) -> DriverTiming {
    DriverTiming {
        warmup: settings.warmup,
        poll_interval: settings.poll_interval,
    }
}

pub fn topic_scheme(settings: &Settings) -> TopicScheme {
    TopicScheme::new(settings.topic_prefix.clone())
}
