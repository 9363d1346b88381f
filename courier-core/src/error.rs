use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Transport outcomes
    #[error("server responded with HTTP {status}")]
    Http { status: u16, body: Option<String> },
    #[error("network failure: {0}")]
    Network(String),

    // Response decoding
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
    #[error("unsupported response charset: {0}")]
    UnsupportedEncoding(String),

    // Synchronous delivery
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("request completed without delivering a response")]
    Interrupted,
    #[error("request failed: {0}")]
    Execution(#[source] Box<Error>),

    // Request construction
    #[error("a delivery channel is already bound to this request")]
    ChannelAlreadyBound,
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    // Transport pass-through for downstream crates
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// HTTP status carried by this error, looking through [`Error::Execution`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Execution(inner) => inner.status(),
            _ => None,
        }
    }

    /// Raw response body of a failed HTTP exchange, if the server sent one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Http { body, .. } => body.as_deref(),
            Error::Execution(inner) => inner.body(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    pub fn is_parse(&self) -> bool {
        match self {
            Error::Parse(_) | Error::UnsupportedEncoding(_) => true,
            Error::Execution(inner) => inner.is_parse(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_recoverable_through_execution() {
        let err = Error::Execution(Box::new(Error::Http {
            status: 404,
            body: Some("missing".to_string()),
        }));
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body(), Some("missing"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn non_http_errors_have_no_status() {
        assert_eq!(Error::Network("refused".into()).status(), None);
        assert_eq!(Error::Timeout(Duration::from_secs(1)).status(), None);
        assert!(Error::Timeout(Duration::from_secs(1)).is_timeout());
    }
}
