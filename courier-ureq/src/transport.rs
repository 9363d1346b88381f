use std::{collections::HashMap, fmt, io, io::Read, sync::Arc, time::Duration};

use courier_core::{
    Completion, Error as CoreError, Method, RawResponse, RetryPolicy, Transport, TransportRequest,
    DEFAULT_BODY_CONTENT_TYPE,
};
use ureq::{Agent, ErrorKind};

use crate::cache::ResponseCache;
use crate::config::TransportConfig;
use crate::error::{Error, Result};

#[cfg(not(feature = "rayon"))]
type Pool = crate::thread_pool::ThreadPool;

#[cfg(feature = "rayon")]
type Pool = rayon::ThreadPool;

/// [`Transport`] running each request on a worker pool with a shared ureq
/// agent.
///
/// The request's [`RetryPolicy`] (or the default one) drives per-attempt
/// timeouts; connection failures and timeouts are retried, HTTP statuses are
/// not. Successful GET responses can be cached in memory.
pub struct UreqTransport {
    agent: Agent,
    pool: Pool,
    cache: Arc<ResponseCache>,
    config: TransportConfig,
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let mut builder = ureq::AgentBuilder::new().timeout_connect(config.connect_timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        Self::with_agent(builder.build(), config)
    }

    /// Use a preconfigured agent (proxy, TLS, ...). Connection settings of
    /// `config` are ignored.
    pub fn with_agent(agent: Agent, config: TransportConfig) -> Result<Self> {
        if config.worker_threads == 0 {
            return Err(Error::EmptyPool);
        }
        Ok(Self {
            agent,
            pool: build_pool(&config)?,
            cache: Arc::new(ResponseCache::new(config.cache_capacity)),
            config,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Number of responses currently held by the GET cache.
    pub fn cached_responses(&self) -> usize {
        self.cache.len()
    }
}

impl Transport for UreqTransport {
    fn enqueue(&self, request: TransportRequest, completion: Completion) {
        let agent = self.agent.clone();
        let cache = self.cache.clone();
        let cacheable = request.method == Method::Get
            && request.should_cache.unwrap_or(self.config.cache_by_default);
        let policy = request.retry_policy.unwrap_or_default();

        spawn(&self.pool, move || {
            if cacheable {
                if let Some(hit) = cache.get(&request.url) {
                    log::debug!("GET {}: served from cache", request.url);
                    completion(Ok(hit));
                    return;
                }
            }

            let result = execute(&agent, &request, &policy);

            if cacheable {
                match &result {
                    Ok(response) if response.is_success() => {
                        if !cache.insert(request.url.clone(), response.clone()) {
                            log::debug!("GET {}: response not cacheable", request.url);
                        }
                    }
                    _ => {}
                }
            }
            completion(result);
        });
    }

    fn default_body_content_type(&self) -> &str {
        self.config
            .body_content_type
            .as_deref()
            .unwrap_or(DEFAULT_BODY_CONTENT_TYPE)
    }

    fn default_headers(&self) -> HashMap<String, String> {
        self.config.default_headers.clone()
    }
}

fn execute(
    agent: &Agent,
    request: &TransportRequest,
    policy: &RetryPolicy,
) -> courier_core::Result<RawResponse> {
    let mut attempt = 0;
    loop {
        let timeout = policy.timeout_for_attempt(attempt);
        match send_once(agent, request, timeout) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                log::warn!(
                    "{} {}: attempt {attempt} failed ({e}), retrying",
                    request.method,
                    request.url
                );
            }
            Err(e) => return Err(CoreError::Network(e.to_string())),
        }
    }
}

/// Why a single attempt produced no response.
enum AttemptError {
    Transport(ureq::Transport),
    /// The connection broke while the body was being read.
    Body(io::Error),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Transport(e) => {
                matches!(e.kind(), ErrorKind::Io | ErrorKind::ConnectionFailed)
            }
            AttemptError::Body(_) => true,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transport(e) => write!(f, "{e}"),
            AttemptError::Body(e) => write!(f, "failed to read response body: {e}"),
        }
    }
}

fn send_once(
    agent: &Agent,
    request: &TransportRequest,
    timeout: Duration,
) -> std::result::Result<RawResponse, AttemptError> {
    let mut req = agent
        .request(request.method.as_str(), &request.url)
        .timeout(timeout);

    for (name, value) in &request.headers {
        req = req.set(name, value);
    }

    let outcome = match &request.body {
        Some(body) => req.set("Content-Type", &request.content_type).send_bytes(body),
        None => req.call(),
    };

    let response = match outcome {
        Ok(response) => response,
        // Non-2xx statuses are ordinary responses at this layer.
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => return Err(AttemptError::Transport(transport)),
    };
    into_raw(response).map_err(AttemptError::Body)
}

fn into_raw(response: ureq::Response) -> io::Result<RawResponse> {
    let status = response.status();
    let headers = response
        .headers_names()
        .into_iter()
        .filter_map(|name| {
            let value = response.header(&name)?.to_string();
            Some((name, value))
        })
        .collect();

    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body)?;
    Ok(RawResponse::new(status, headers, body))
}

#[cfg(not(feature = "rayon"))]
fn build_pool(config: &TransportConfig) -> Result<Pool> {
    Ok(crate::thread_pool::ThreadPool::new(
        config.worker_threads,
        &config.thread_name,
    )?)
}

#[cfg(feature = "rayon")]
fn build_pool(config: &TransportConfig) -> Result<Pool> {
    let name = config.thread_name.clone();
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .thread_name(move |index| format!("{name}-{index}"))
        .panic_handler(|_| log::error!("task panicked on worker pool"))
        .build()?)
}

#[cfg(not(feature = "rayon"))]
fn spawn<F: FnOnce() + Send + 'static>(pool: &Pool, task: F) {
    pool.execute(task);
}

#[cfg(feature = "rayon")]
fn spawn<F: FnOnce() + Send + 'static>(pool: &Pool, task: F) {
    pool.spawn(task);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected() {
        let config = TransportConfig::default().with_worker_threads(0);
        let err = UreqTransport::new(config).err().unwrap();
        assert!(matches!(err, Error::EmptyPool));

        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Backend(_)));
    }

    #[test]
    fn defaults_come_from_config() {
        let transport = UreqTransport::new(
            TransportConfig::default().with_default_header("Accept", "application/json"),
        )
        .unwrap();
        assert_eq!(
            transport.default_body_content_type(),
            DEFAULT_BODY_CONTENT_TYPE
        );
        assert_eq!(transport.default_headers()["Accept"], "application/json");
        assert_eq!(transport.cached_responses(), 0);
    }
}
