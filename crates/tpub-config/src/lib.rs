//! tpub-config
//!
//! Environment-style settings for the publisher daemon.
//!
//! # Contract
//! - Every key has a default; an unset or blank variable means "use the default".
//! - `main` calls [`Settings::from_env`] once and passes the pieces into
//!   constructors. Do not scatter `std::env::var` calls across the workspace.
//! - `Debug` output redacts the database password.
//! - Error messages name the offending KEY and the bad value, except for secrets.
//! - [`Settings::to_log_json`] renders the resolved settings for the startup
//!   log; the password is never serialized.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Serialize, Serializer};

pub const KEY_DB_HOST: &str = "DB_HOST";
pub const KEY_DB_PORT: &str = "DB_PORT";
pub const KEY_DB_NAME: &str = "DB_NAME";
pub const KEY_DB_USER: &str = "DB_USER";
pub const KEY_DB_PASS: &str = "DB_PASS";
pub const KEY_DB_TABLE: &str = "DB_TABLE";
pub const KEY_DB_ID_COLUMN: &str = "DB_ID_COLUMN";
pub const KEY_DB_VALUE_COLUMN: &str = "DB_VALUE_COLUMN";
pub const KEY_FETCH_TIMEOUT: &str = "FETCH_TIMEOUT_SECONDS";
pub const KEY_MQTT_HOST: &str = "MQTT_HOST";
pub const KEY_MQTT_PORT: &str = "MQTT_PORT";
pub const KEY_MQTT_CLIENT_ID: &str = "MQTT_CLIENT_ID";
pub const KEY_MQTT_KEEP_ALIVE: &str = "MQTT_KEEP_ALIVE_SECONDS";
pub const KEY_PUBLISH_TIMEOUT: &str = "PUBLISH_TIMEOUT_SECONDS";
pub const KEY_MQTT_MAX_PACKET: &str = "MQTT_MAX_PACKET_BYTES";
pub const KEY_TOPIC_PREFIX: &str = "TOPIC_PREFIX";
pub const KEY_POLL_INTERVAL: &str = "POLL_INTERVAL_SECONDS";
pub const KEY_WARMUP: &str = "WARMUP_SECONDS";
pub const KEY_TRACKING_FILE: &str = "TRACKING_FILE";

pub const DEFAULT_DB_HOST: &str = "SITH-MySQL";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_NAME: &str = "SITH";
pub const DEFAULT_DB_USER: &str = "SITH";
pub const DEFAULT_DB_PASS: &str = "SITH";
pub const DEFAULT_DB_TABLE: &str = "rovers";
pub const DEFAULT_DB_ID_COLUMN: &str = "roverID";
pub const DEFAULT_DB_VALUE_COLUMN: &str = "data";
pub const DEFAULT_MQTT_HOST: &str = "SITH-MQTT-Broker";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_KEEP_ALIVE_SECS: u64 = 60;
pub const DEFAULT_TOPIC_PREFIX: &str = "rovers/";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_WARMUP_SECS: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 10;
/// The MQTT v3.1.1 ceiling: a table value is never refused for size alone.
pub const DEFAULT_MQTT_MAX_PACKET_BYTES: usize = 268_435_455;
pub const DEFAULT_TRACKING_FILE: &str = "/app/published_modules.json";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Connection and query parameters for the source database.
///
/// **The password is redacted in `Debug` output.**
#[derive(Clone, Serialize)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(skip)]
    pub password: String,
    /// Source table. Validated as a plain SQL identifier.
    pub table: String,
    /// Column holding the entity identifier.
    pub id_column: String,
    /// Column holding the payload.
    pub value_column: String,
    /// Upper bound on connect + query for one fetch.
    #[serde(serialize_with = "as_secs")]
    pub fetch_timeout: Duration,
}

impl std::fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .field("value_column", &self.value_column)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

/// MQTT broker connection parameters.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    #[serde(serialize_with = "as_secs")]
    pub keep_alive: Duration,
    /// Upper bound on handing one publish to the client request queue.
    #[serde(serialize_with = "as_secs")]
    pub publish_timeout: Duration,
    /// Largest encoded packet the client sends or accepts.
    pub max_packet_size: usize,
}

/// Everything the daemon needs, resolved once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub db: DbSettings,
    pub broker: BrokerSettings,
    /// Prepended verbatim to every normalised identifier.
    pub topic_prefix: String,
    /// Delay between the end of one cycle and the start of the next.
    #[serde(serialize_with = "as_secs")]
    pub poll_interval: Duration,
    /// Delay before the first cycle, giving the database time to come up.
    #[serde(serialize_with = "as_secs")]
    pub warmup: Duration,
    /// JSON file holding the identifiers published by the last successful cycle.
    pub tracking_file: PathBuf,
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(lookup(key));

        let db = DbSettings {
            host: get(KEY_DB_HOST).unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: parse_or(&get, KEY_DB_PORT, DEFAULT_DB_PORT)?,
            database: get(KEY_DB_NAME).unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            user: get(KEY_DB_USER).unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            // Password is taken verbatim: surrounding whitespace may be significant.
            password: lookup(KEY_DB_PASS)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_DB_PASS.to_string()),
            table: sql_identifier(&get, KEY_DB_TABLE, DEFAULT_DB_TABLE)?,
            id_column: sql_identifier(&get, KEY_DB_ID_COLUMN, DEFAULT_DB_ID_COLUMN)?,
            value_column: sql_identifier(&get, KEY_DB_VALUE_COLUMN, DEFAULT_DB_VALUE_COLUMN)?,
            fetch_timeout: Duration::from_secs(positive_secs(
                &get,
                KEY_FETCH_TIMEOUT,
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?),
        };

        let broker = BrokerSettings {
            host: get(KEY_MQTT_HOST).unwrap_or_else(|| DEFAULT_MQTT_HOST.to_string()),
            port: parse_or(&get, KEY_MQTT_PORT, DEFAULT_MQTT_PORT)?,
            client_id: get(KEY_MQTT_CLIENT_ID)
                .unwrap_or_else(|| format!("tpub-{}", std::process::id())),
            keep_alive: Duration::from_secs(positive_secs(
                &get,
                KEY_MQTT_KEEP_ALIVE,
                DEFAULT_MQTT_KEEP_ALIVE_SECS,
            )?),
            publish_timeout: Duration::from_secs(positive_secs(
                &get,
                KEY_PUBLISH_TIMEOUT,
                DEFAULT_PUBLISH_TIMEOUT_SECS,
            )?),
            max_packet_size: parse_or(&get, KEY_MQTT_MAX_PACKET, DEFAULT_MQTT_MAX_PACKET_BYTES)?,
        };

        if db.port == 0 {
            bail!("CONFIG_INVALID: {KEY_DB_PORT} must be non-zero");
        }
        if broker.port == 0 {
            bail!("CONFIG_INVALID: {KEY_MQTT_PORT} must be non-zero");
        }
        if broker.max_packet_size == 0 || broker.max_packet_size > DEFAULT_MQTT_MAX_PACKET_BYTES {
            bail!(
                "CONFIG_INVALID: {KEY_MQTT_MAX_PACKET}={} must be between 1 and \
                 {DEFAULT_MQTT_MAX_PACKET_BYTES}",
                broker.max_packet_size
            );
        }

        // The prefix is not trimmed: "rovers/ " would be odd but is the operator's call.
        let topic_prefix = lookup(KEY_TOPIC_PREFIX)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string());
        if topic_prefix.contains(['+', '#', '\0']) {
            bail!(
                "CONFIG_INVALID: {KEY_TOPIC_PREFIX}='{topic_prefix}' contains an MQTT \
                 wildcard or NUL character"
            );
        }

        Ok(Settings {
            db,
            broker,
            topic_prefix,
            poll_interval: Duration::from_secs(positive_secs(
                &get,
                KEY_POLL_INTERVAL,
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            warmup: Duration::from_secs(parse_or(&get, KEY_WARMUP, DEFAULT_WARMUP_SECS)?),
            tracking_file: get(KEY_TRACKING_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACKING_FILE)),
        })
    }
}

impl Settings {
    /// Single-line JSON of the resolved settings, password omitted.
    pub fn to_log_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to render settings")
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn as_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

fn non_blank(v: Option<String>) -> Option<String> {
    let v = v?;
    let trimmed = v.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("CONFIG_INVALID: {key}='{raw}' is not a valid number")),
    }
}

fn positive_secs<G>(get: &G, key: &str, default: u64) -> Result<u64>
where
    G: Fn(&str) -> Option<String>,
{
    let secs = parse_or(get, key, default)?;
    if secs == 0 {
        bail!("CONFIG_INVALID: {key} must be at least 1 second");
    }
    Ok(secs)
}

/// Table and column names are interpolated into the query text, so only
/// plain identifiers are accepted.
fn sql_identifier<G>(get: &G, key: &str, default: &str) -> Result<String>
where
    G: Fn(&str) -> Option<String>,
{
    let name = get(key).unwrap_or_else(|| default.to_string());
    if !is_plain_identifier(&name) {
        bail!(
            "CONFIG_INVALID: {key}='{name}' must contain only ASCII letters, digits and '_'"
        );
    }
    Ok(name)
}

pub fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifier_rules() {
        assert!(is_plain_identifier("roverID"));
        assert!(is_plain_identifier("rover_data_2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("rovers; DROP TABLE x"));
        assert!(!is_plain_identifier("a`b"));
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  x ".to_string())), Some("x".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }
}
