#![allow(clippy::module_inception)]
//! Declarative HTTP requests with callback or blocking delivery.
//!
//! Build a request from a [`Dispatcher`], pick how its body is decoded, then
//! either [`Dispatcher::send_async`] it with a callback or block on it with
//! [`Dispatcher::send_sync`]. Queueing, worker threads and retries belong to
//! the [`Transport`] behind the dispatcher.

pub mod codec;
pub mod config;
pub mod delivery;
mod dispatcher;
pub mod error;
mod request;
pub mod transport;

pub use codec::{codec, JsonCodec};
pub use config::{Configuration, RetryPolicy};
pub use delivery::{ResponseCallback, ResponseFuture};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use request::{Discard, Json, Method, Request, RequestBuilder, ResponseDecoder, Text};
pub use transport::{
    set_header, Completion, RawResponse, StubReply, StubTransport, Transport, TransportRequest,
    DEFAULT_BODY_CONTENT_TYPE,
};
