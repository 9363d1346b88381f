use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    time::Duration,
};

use serde_json::{Map, Value};
use url::{form_urlencoded, Url};

use crate::codec::codec;
use crate::config::{Configuration, RetryPolicy};
use crate::error::Result;
use crate::transport::{set_header, TransportRequest};

use super::decoder::{Discard, Json, ResponseDecoder, Text};
use super::method::Method;

/// Collects the parts of one outgoing request.
///
/// Created from a [`Configuration`] snapshot, usually through
/// [`crate::Dispatcher::get`] and friends. [`RequestBuilder::build`] freezes it
/// into a [`Request`]; nothing can be added afterwards.
pub struct RequestBuilder<D = Discard> {
    method: Method,
    url: String,
    query_params: BTreeMap<String, String>,
    body_params: Map<String, Value>,
    raw_body: Option<String>,
    headers: HashMap<String, String>,
    body_content_type: Option<String>,
    retry_policy: Option<RetryPolicy>,
    should_cache: Option<bool>,
    sync_timeout: Option<Duration>,
    decoder: D,
}

impl RequestBuilder<Discard> {
    pub fn new(method: Method, url: impl Into<String>, config: &Configuration) -> Self {
        Self {
            method,
            url: url.into(),
            query_params: BTreeMap::new(),
            body_params: Map::new(),
            raw_body: None,
            headers: config.headers.clone(),
            body_content_type: config.body_content_type.clone(),
            retry_policy: config.retry_policy,
            should_cache: config.should_cache,
            sync_timeout: config.sync_timeout,
            decoder: Discard,
        }
    }
}

impl<D: ResponseDecoder> RequestBuilder<D> {
    /// Append `key=value` to the query string. A repeated key replaces the
    /// previous value.
    pub fn query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query_params.insert(key.into(), value.to_string());
        self
    }

    /// Like [`RequestBuilder::query_param`], but `None` adds nothing.
    pub fn optional_query_param<V: ToString>(
        self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.query_param(key, value),
            None => self,
        }
    }

    /// Add a field to the JSON object sent as body. Null values are kept.
    /// Ignored entirely once [`RequestBuilder::body`] is set.
    pub fn body_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body_params.insert(key.into(), value.into());
        self
    }

    /// Send `raw` as the body verbatim, ignoring any body params.
    pub fn body(mut self, raw: impl Into<String>) -> Self {
        self.raw_body = Some(raw.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }

    /// Adds the header only when a value is present.
    pub fn optional_header(self, name: impl Into<String>, value: Option<String>) -> Self {
        match value {
            Some(value) => self.header(name, value),
            None => self,
        }
    }

    pub fn body_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.body_content_type = Some(content_type.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn should_cache(mut self, should_cache: bool) -> Self {
        self.should_cache = Some(should_cache);
        self
    }

    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }

    /// Swap the response decoder.
    pub fn decoder<E: ResponseDecoder>(self, decoder: E) -> RequestBuilder<E> {
        RequestBuilder {
            method: self.method,
            url: self.url,
            query_params: self.query_params,
            body_params: self.body_params,
            raw_body: self.raw_body,
            headers: self.headers,
            body_content_type: self.body_content_type,
            retry_policy: self.retry_policy,
            should_cache: self.should_cache,
            sync_timeout: self.sync_timeout,
            decoder,
        }
    }

    /// Decode a successful response body as JSON into `T`.
    pub fn decode_json<T>(self) -> RequestBuilder<Json<T>>
    where
        Json<T>: ResponseDecoder,
    {
        self.decoder(Json::new())
    }

    pub fn decode_text(self) -> RequestBuilder<Text> {
        self.decoder(Text)
    }

    /// Freeze the request, resolving its full URL and body once.
    pub fn build(self) -> Result<Request<D>> {
        let url = if self.query_params.is_empty() {
            self.url
        } else {
            append_query(&self.url, &self.query_params)?
        };

        let body = match self.raw_body {
            Some(raw) => Some(raw),
            None if !self.body_params.is_empty() => Some(codec().encode(&self.body_params)?),
            None => None,
        };

        Ok(Request {
            method: self.method,
            url,
            body,
            headers: self.headers,
            body_content_type: self.body_content_type,
            retry_policy: self.retry_policy,
            should_cache: self.should_cache,
            sync_timeout: self.sync_timeout,
            decoder: self.decoder,
        })
    }
}

/// Append the encoded parameters to `base` as written. The base is only
/// parsed for validation; its spelling is kept.
fn append_query(base: &str, params: &BTreeMap<String, String>) -> Result<String> {
    Url::parse(base)?;
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();

    let (head, fragment) = match base.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (base, None),
    };
    let separator = match head.find('?') {
        None => "?",
        Some(_) if head.ends_with('?') || head.ends_with('&') => "",
        Some(_) => "&",
    };

    let mut url = format!("{head}{separator}{query}");
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    Ok(url)
}

/// An immutable, ready-to-send request.
pub struct Request<D = Discard> {
    method: Method,
    url: String,
    body: Option<String>,
    headers: HashMap<String, String>,
    body_content_type: Option<String>,
    retry_policy: Option<RetryPolicy>,
    should_cache: Option<bool>,
    sync_timeout: Option<Duration>,
    decoder: D,
}

impl<D> Request<D> {
    pub fn method(&self) -> Method {
        self.method
    }

    /// Base URL with the query parameters appended.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref().map(str::as_bytes)
    }

    /// Content type override from the configuration or the builder. `None`
    /// means the transport default applies.
    pub fn body_content_type(&self) -> Option<&str> {
        self.body_content_type.as_deref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    pub fn should_cache(&self) -> Option<bool> {
        self.should_cache
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout
    }

    pub(crate) fn into_parts(
        self,
        default_content_type: &str,
        mut default_headers: HashMap<String, String>,
    ) -> (TransportRequest, D) {
        for (name, value) in self.headers {
            set_header(&mut default_headers, name, value);
        }
        let request = TransportRequest {
            method: self.method,
            url: self.url,
            headers: default_headers,
            body: self.body.map(String::into_bytes),
            content_type: self
                .body_content_type
                .unwrap_or_else(|| default_content_type.to_string()),
            retry_policy: self.retry_policy,
            should_cache: self.should_cache,
        };
        (request, self.decoder)
    }
}

impl<D> fmt::Debug for Request<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;

    const URL: &str = "http://example.com/posts";

    fn builder() -> RequestBuilder {
        RequestBuilder::new(Method::Get, URL, &Configuration::default())
    }

    fn query_pairs(url: &str) -> HashSet<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn url_without_params_is_verbatim() {
        let config = Configuration::default();
        let request = RequestBuilder::new(Method::Get, "http://example.com", &config)
            .build()
            .unwrap();
        assert_eq!(request.url(), "http://example.com");
    }

    #[test]
    fn url_carries_every_query_param() {
        let request = builder()
            .query_param("userId", 1)
            .query_param("sort", "desc")
            .query_param("page", 3u8)
            .build()
            .unwrap();

        let expected: HashSet<_> = [("userId", "1"), ("sort", "desc"), ("page", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(query_pairs(request.url()), expected);
        assert_eq!(request.url().matches('=').count(), 3);
        assert_eq!(request.url(), request.url());
        assert!(request.url().starts_with("http://example.com/posts?"));
    }

    #[test]
    fn none_query_param_is_skipped() {
        let request = builder()
            .optional_query_param("userId", Some(7))
            .optional_query_param::<u32>("missing", None)
            .build()
            .unwrap();
        assert_eq!(request.url(), "http://example.com/posts?userId=7");
        assert!(!request.url().contains("missing"));
    }

    #[test]
    fn base_url_keeps_its_spelling() {
        let config = Configuration::default();
        let bare = RequestBuilder::new(Method::Get, "http://example.com", &config)
            .query_param("a", 1)
            .build()
            .unwrap();
        assert_eq!(bare.url(), "http://example.com?a=1");

        let existing = RequestBuilder::new(Method::Get, "http://example.com/p?x=y#top", &config)
            .query_param("a", 1)
            .build()
            .unwrap();
        assert_eq!(existing.url(), "http://example.com/p?x=y&a=1#top");
    }

    #[test]
    fn query_params_are_encoded() {
        let request = builder().query_param("q", "a b&c").build().unwrap();
        assert_eq!(request.url(), "http://example.com/posts?q=a+b%26c");
    }

    #[test]
    fn invalid_url_is_rejected_when_params_are_present() {
        let result = RequestBuilder::new(Method::Get, "not a url", &Configuration::default())
            .query_param("a", 1)
            .build();
        assert!(matches!(result, Err(crate::Error::InvalidUrl(_))));
    }

    #[test]
    fn raw_body_wins_over_body_params() {
        let request = builder()
            .body_param("ignored", 1)
            .body("{\"raw\":true}")
            .body_param("also_ignored", "x")
            .build()
            .unwrap();
        assert_eq!(request.body(), Some(&b"{\"raw\":true}"[..]));
    }

    #[test]
    fn body_params_become_a_json_object() {
        let request = builder()
            .body_param("userId", 2)
            .body_param("title", "test title")
            .body_param("missing", Value::Null)
            .build()
            .unwrap();

        let body: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
        let mut expected = Map::new();
        expected.insert("userId".into(), 2.into());
        expected.insert("title".into(), "test title".into());
        expected.insert("missing".into(), Value::Null);
        assert_eq!(body, Value::Object(expected));
    }

    #[test]
    fn no_body_without_params() {
        assert_eq!(builder().build().unwrap().body(), None);
    }

    #[test]
    fn configuration_seeds_the_builder() {
        let config = Configuration::new()
            .with_header("Accept", "application/json")
            .with_body_content_type("text/plain")
            .with_should_cache(false)
            .with_sync_timeout(Duration::from_secs(3));

        let request = RequestBuilder::new(Method::Post, URL, &config)
            .header("X-Trace", "abc")
            .build()
            .unwrap();

        assert_eq!(request.headers()["Accept"], "application/json");
        assert_eq!(request.headers()["X-Trace"], "abc");
        assert_eq!(request.body_content_type(), Some("text/plain"));
        assert_eq!(request.should_cache(), Some(false));
        assert_eq!(request.sync_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn request_headers_override_transport_defaults() {
        let config = Configuration::new().with_header("Accept", "application/json");
        let request = RequestBuilder::new(Method::Get, URL, &config)
            .optional_header("X-Empty", None)
            .build()
            .unwrap();

        let mut defaults = HashMap::new();
        defaults.insert("Accept".to_string(), "*/*".to_string());
        defaults.insert("User-Agent".to_string(), "courier".to_string());

        let (wire, _) = request.into_parts("application/octet-stream", defaults);
        assert_eq!(wire.headers["Accept"], "application/json");
        assert_eq!(wire.headers["User-Agent"], "courier");
        assert!(!wire.headers.contains_key("X-Empty"));
        assert_eq!(wire.content_type, "application/octet-stream");
    }

    #[test]
    fn header_names_merge_case_insensitively() {
        let config = Configuration::new().with_header("x-mode", "config");
        let request = RequestBuilder::new(Method::Get, URL, &config)
            .header("ACCEPT", "text/plain")
            .header("accept", "application/json")
            .build()
            .unwrap();
        assert_eq!(request.headers().len(), 2);
        assert_eq!(request.headers()["accept"], "application/json");

        let mut defaults = HashMap::new();
        defaults.insert("X-Mode".to_string(), "transport".to_string());
        defaults.insert("Accept".to_string(), "*/*".to_string());

        let (wire, _) = request.into_parts(crate::DEFAULT_BODY_CONTENT_TYPE, defaults);
        let modes: Vec<_> = wire
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("x-mode"))
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(modes, vec!["config"]);
        assert_eq!(wire.headers.len(), 2);
        assert_eq!(wire.headers["accept"], "application/json");
    }
}
