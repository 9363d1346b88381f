mod cache;
mod config;
pub mod error;
mod transport;

#[cfg(not(feature = "rayon"))]
mod thread_pool;

pub use config::TransportConfig;
pub use transport::UreqTransport;

// Re-export core types so most callers only need this crate
pub use courier_core::{
    codec, Configuration, Discard, Dispatcher, Error, Json, Method, RawResponse, Request,
    RequestBuilder, ResponseCallback, ResponseDecoder, ResponseFuture, Result, RetryPolicy, Text,
    Transport,
};

/// Create a dispatcher backed by a fresh [`UreqTransport`].
pub fn init(config: TransportConfig) -> error::Result<Dispatcher<UreqTransport>> {
    Ok(Dispatcher::new(UreqTransport::new(config)?))
}

/// Like [`init`], with request defaults applied from the start.
pub fn init_with_configuration(
    config: TransportConfig,
    defaults: Configuration,
) -> error::Result<Dispatcher<UreqTransport>> {
    Ok(Dispatcher::with_configuration(
        UreqTransport::new(config)?,
        defaults,
    ))
}
