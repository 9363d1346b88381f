use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transport::set_header;

/// Defaults applied to every request built by a [`crate::Dispatcher`].
///
/// Each field left unset defers to the transport. Values are copied into a
/// request when its builder is created, so replacing the configuration later
/// does not touch requests that already exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Configuration {
    pub retry_policy: Option<RetryPolicy>,
    pub should_cache: Option<bool>,
    pub body_content_type: Option<String>,
    pub headers: HashMap<String, String>,
    /// Upper bound for [`crate::Dispatcher::send_sync`]. Not the same thing as
    /// the per-attempt timeout of the retry policy.
    #[serde(with = "duration_ms", rename = "syncTimeoutMs")]
    pub sync_timeout: Option<Duration>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_should_cache(mut self, should_cache: bool) -> Self {
        self.should_cache = Some(should_cache);
        self
    }

    pub fn with_body_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.body_content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }
}

/// Per-attempt timeout and retry budget, executed by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(with = "duration_ms_required", rename = "initialTimeoutMs")]
    pub initial_timeout: Duration,
    pub max_retries: u32,
    pub backoff_multiplier: f32,
}

impl RetryPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);
    pub const DEFAULT_MAX_RETRIES: u32 = 1;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f32 = 1.0;

    pub fn new(initial_timeout: Duration, max_retries: u32, backoff_multiplier: f32) -> Self {
        Self {
            initial_timeout,
            max_retries,
            backoff_multiplier,
        }
    }

    /// Timeout of attempt `attempt` (0 = first try). Each retry adds
    /// `timeout * backoff_multiplier` to the previous timeout.
    pub fn timeout_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1.0 + self.backoff_multiplier.max(0.0) as f64;
        let nanos = self.initial_timeout.as_nanos() as f64 * factor.powi(attempt.min(64) as i32);
        Duration::from_nanos(nanos.min(u64::MAX as f64).round() as u64)
    }

    /// Total number of attempts, first try included.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_TIMEOUT,
            Self::DEFAULT_MAX_RETRIES,
            Self::DEFAULT_BACKOFF_MULTIPLIER,
        )
    }
}

/// `Option<Duration>` as optional milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// `Duration` as milliseconds.
pub mod duration_ms_required {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_grow_with_backoff() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 3, 1.0);
        assert_eq!(policy.timeout_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.timeout_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.timeout_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.attempts(), 4);

        let flat = RetryPolicy::new(Duration::from_millis(100), 0, 0.0);
        assert_eq!(flat.timeout_for_attempt(5), Duration::from_millis(100));
        assert_eq!(flat.attempts(), 1);
    }

    #[test]
    fn loads_from_json() {
        let config = Configuration::from_json(
            r#"{
                "shouldCache": false,
                "bodyContentType": "application/json",
                "headers": {"Accept": "application/json"},
                "syncTimeoutMs": 30000,
                "retryPolicy": {"initialTimeoutMs": 1000, "maxRetries": 2, "backoffMultiplier": 0.5}
            }"#,
        )
        .unwrap();

        assert_eq!(config.should_cache, Some(false));
        assert_eq!(config.sync_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.headers["Accept"], "application/json");
        assert_eq!(
            config.retry_policy,
            Some(RetryPolicy::new(Duration::from_secs(1), 2, 0.5))
        );
    }

    #[test]
    fn missing_fields_stay_unset() {
        let config = Configuration::from_json("{}").unwrap();
        assert_eq!(config, Configuration::default());

        let config = Configuration::new().with_sync_timeout(Duration::from_millis(5));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"syncTimeoutMs\":5"));
    }
}
