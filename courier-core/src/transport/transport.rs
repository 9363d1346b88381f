use std::collections::HashMap;

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::request::Method;

/// Content type used for request bodies when neither the configuration nor the
/// transport says otherwise.
pub const DEFAULT_BODY_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Completion hook handed to the transport together with each request.
pub type Completion = Box<dyn FnOnce(Result<RawResponse>) + Send + 'static>;

/// Queue-backed HTTP executor.
///
/// Implementations run requests on their own threads and must never block in
/// [`Transport::enqueue`].
pub trait Transport: Send + Sync + 'static {
    /// Queue a request. `completion` is called at most once, from any thread.
    fn enqueue(&self, request: TransportRequest, completion: Completion);

    /// Body content type for requests that do not configure one.
    fn default_body_content_type(&self) -> &str {
        DEFAULT_BODY_CONTENT_TYPE
    }

    /// Headers sent with every request. Request headers override them.
    fn default_headers(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// Insert a header, replacing any existing entry whose name matches
/// case-insensitively.
pub fn set_header(headers: &mut HashMap<String, String>, name: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

/// A request as the transport sees it: everything resolved, nothing lazy.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub content_type: String,
    pub retry_policy: Option<RetryPolicy>,
    pub should_cache: Option<bool>,
}

/// Status, headers and undecoded body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RawResponse {
    /// Header names are stored lower-cased.
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Lower-cased `charset` parameter of the `Content-Type` header, `utf-8`
    /// when absent.
    pub fn charset(&self) -> String {
        self.header("content-type")
            .and_then(|content_type| {
                content_type.split(';').skip(1).find_map(|param| {
                    let (key, value) = param.split_once('=')?;
                    key.trim()
                        .eq_ignore_ascii_case("charset")
                        .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
                })
            })
            .filter(|charset| !charset.is_empty())
            .unwrap_or_else(|| "utf-8".to_string())
    }

    /// Body as text for error reporting; invalid UTF-8 is replaced.
    pub fn lossy_body(&self) -> Option<String> {
        if self.body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.body).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_content_type(value: &str) -> RawResponse {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), value.to_string());
        RawResponse::new(200, headers, Vec::new())
    }

    #[test]
    fn charset_parsing() {
        assert_eq!(with_content_type("application/json").charset(), "utf-8");
        assert_eq!(
            with_content_type("text/plain; charset=\"ISO-8859-1\"").charset(),
            "iso-8859-1"
        );
        assert_eq!(
            with_content_type("text/html; q=1;Charset=UTF-8").charset(),
            "utf-8"
        );
        assert_eq!(RawResponse::new(204, HashMap::new(), vec![]).charset(), "utf-8");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let resp = with_content_type("application/json");
        assert_eq!(resp.header("CONTENT-TYPE"), Some("application/json"));
        assert!(resp.is_success());
        assert_eq!(resp.lossy_body(), None);
    }
}
