use std::{collections::HashMap, time::Duration};

use courier_core::{config::duration_ms_required, set_header};
use serde::{Deserialize, Serialize};

/// Settings for [`crate::UreqTransport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportConfig {
    /// Number of requests executed in parallel.
    pub worker_threads: usize,
    /// Prefix of the worker thread names.
    pub thread_name: String,
    #[serde(with = "duration_ms_required", rename = "connectTimeoutMs")]
    pub connect_timeout: Duration,
    pub user_agent: Option<String>,
    /// Sent with every request; request headers take precedence.
    pub default_headers: HashMap<String, String>,
    /// Content type for bodies of requests that do not set one.
    pub body_content_type: Option<String>,
    /// Whether GET responses are cached when a request leaves it unset.
    /// Responses still need cache headers that allow storing them.
    pub cache_by_default: bool,
    pub cache_capacity: usize,
}

impl TransportConfig {
    pub const DEFAULT_WORKER_THREADS: usize = 4;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_CACHE_CAPACITY: usize = 64;

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        set_header(&mut self.default_headers, name.into(), value.into());
        self
    }

    pub fn with_cache_by_default(mut self, cache_by_default: bool) -> Self {
        self.cache_by_default = cache_by_default;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            worker_threads: Self::DEFAULT_WORKER_THREADS,
            thread_name: "courier".to_string(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            user_agent: None,
            default_headers: HashMap::new(),
            body_content_type: None,
            cache_by_default: true,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"workerThreads": 8, "connectTimeoutMs": 1500}"#).unwrap();
        assert_eq!(config.worker_threads, 8);
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.cache_capacity, TransportConfig::DEFAULT_CACHE_CAPACITY);
        assert!(config.cache_by_default);
    }
}
