/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "rovers/";

/// Maps raw entity identifiers to broker topics.
///
/// Normalisation: trim surrounding whitespace, then replace every space and
/// every `/` with `_`, then prepend the prefix. `"x y/z"` becomes
/// `"<prefix>x_y_z"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl TopicScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Normalised identifier without the prefix.
    pub fn normalize(raw: &str) -> String {
        raw.trim().replace([' ', '/'], "_")
    }

    /// Full topic for `raw`, or `None` when the identifier cannot name a
    /// topic: empty after trimming, or containing an MQTT wildcard or NUL.
    pub fn topic_for(&self, raw: &str) -> Option<String> {
        let name = Self::normalize(raw);
        if name.is_empty() || name.contains(['+', '#', '\0']) {
            return None;
        }
        Some(format!("{}{}", self.prefix, name))
    }
}
