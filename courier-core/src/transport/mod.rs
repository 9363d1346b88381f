//! Boundary between the dispatcher and the HTTP client that executes requests.
//!
//! A [`Transport`] owns the request queue and the worker threads. It receives a
//! fully resolved [`TransportRequest`] and must call its [`Completion`] at most
//! once with either the raw response or a network-level error. Non-2xx statuses
//! are reported as ordinary [`RawResponse`]s; the dispatcher turns them into
//! [`crate::Error::Http`].

mod stub_transport;
mod transport;

pub use stub_transport::{StubReply, StubTransport};
pub use transport::{
    set_header, Completion, RawResponse, Transport, TransportRequest, DEFAULT_BODY_CONTENT_TYPE,
};
