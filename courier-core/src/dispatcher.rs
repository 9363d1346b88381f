use std::sync::{Arc, PoisonError, RwLock};

use crate::config::Configuration;
use crate::delivery::{self, Channel, Delivery, ResponseCallback, ResponseFuture};
use crate::error::{Error, Result};
use crate::request::{Method, Request, RequestBuilder, ResponseDecoder};
use crate::transport::{RawResponse, Transport};

/// Entry point for sending requests.
///
/// Owns the transport (and with it the one request queue) plus the default
/// [`Configuration`] that seeds every builder it hands out.
pub struct Dispatcher<T: Transport> {
    transport: T,
    config: RwLock<Arc<Configuration>>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self::with_configuration(transport, Configuration::default())
    }

    pub fn with_configuration(transport: T, config: Configuration) -> Self {
        Self {
            transport,
            config: RwLock::new(Arc::new(config)),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Replace the defaults for builders created from now on. Builders and
    /// requests that already exist keep the values they were created with.
    pub fn set_default_configuration(&self, config: Configuration) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    pub fn default_configuration(&self) -> Arc<Configuration> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url, &self.default_configuration())
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Get, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Post, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Put, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Delete, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Patch, url)
    }

    /// Queue `request` and return immediately. `callback` runs on a transport
    /// thread once the request succeeds or fails.
    pub fn send_async<D, C>(&self, request: Request<D>, callback: C)
    where
        D: ResponseDecoder,
        C: ResponseCallback<D::Output>,
    {
        self.dispatch(request, Some(Channel::Callback(Box::new(callback))));
    }

    /// Queue `request` without listening for the outcome. Failures are logged.
    pub fn send<D: ResponseDecoder>(&self, request: Request<D>) {
        self.dispatch(request, None);
    }

    /// Queue `request` and return a future for its outcome.
    pub fn enqueue<D: ResponseDecoder>(&self, request: Request<D>) -> ResponseFuture<D::Output> {
        let (slot, future) = delivery::future();
        self.dispatch(request, Some(Channel::Future(slot)));
        future
    }

    /// Send `request` and block until it resolves or its sync timeout elapses.
    ///
    /// Blocks the calling thread: never call this from a thread that has to
    /// stay responsive, or from one the transport completes requests on.
    ///
    /// Failures come back as [`Error::Execution`] wrapping the cause, so an
    /// HTTP status stays reachable through [`Error::status`].
    pub fn send_sync<D: ResponseDecoder>(&self, request: Request<D>) -> Result<D::Output> {
        let timeout = request.sync_timeout();
        self.enqueue(request).wait(timeout)
    }

    fn dispatch<D: ResponseDecoder>(
        &self,
        request: Request<D>,
        channel: Option<Channel<D::Output>>,
    ) {
        let label = format!("{} {}", request.method(), request.url());
        let mut delivery = Delivery::new(label.clone());
        if let Some(channel) = channel {
            if let Err(e) = delivery.bind(channel) {
                log::error!("{label}: {e}");
                return;
            }
        }

        let (wire, decoder) = request.into_parts(
            self.transport.default_body_content_type(),
            self.transport.default_headers(),
        );

        log::debug!("{label}: enqueued");
        self.transport.enqueue(
            wire,
            Box::new(move |outcome| {
                let result = outcome.and_then(|response| complete(&decoder, response));
                match &result {
                    Ok(_) => log::debug!("{label}: succeeded"),
                    Err(e) => log::debug!("{label}: failed: {e}"),
                }
                delivery.deliver(result);
            }),
        );
    }
}

fn complete<D: ResponseDecoder>(decoder: &D, response: RawResponse) -> Result<D::Output> {
    if !response.is_success() {
        return Err(Error::Http {
            status: response.status(),
            body: response.lossy_body(),
        });
    }
    decoder.decode(&response)
}
