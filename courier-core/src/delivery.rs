//! How a finished request reaches its caller.
//!
//! A request gets at most one [`Channel`]: either a [`ResponseCallback`] run on
//! the transport thread, or a [`FutureSlot`] whose [`ResponseFuture`] a caller
//! blocks on. Binding a second channel is an error.

use std::{
    fmt,
    sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError},
    time::Duration,
};

use crate::error::{Error, Result};

/// Receives the outcome of an asynchronous send.
///
/// Exactly one of the two methods is called, once, on whatever thread the
/// transport completes on. Any `FnOnce(Result<T>)` closure is a callback.
pub trait ResponseCallback<T>: Send + 'static {
    fn on_success(self: Box<Self>, value: T);

    fn on_failure(self: Box<Self>, error: Error);
}

impl<T, F> ResponseCallback<T> for F
where
    F: FnOnce(Result<T>) + Send + 'static,
{
    fn on_success(self: Box<Self>, value: T) {
        (*self)(Ok(value))
    }

    fn on_failure(self: Box<Self>, error: Error) {
        (*self)(Err(error))
    }
}

/// Create a connected slot/future pair.
pub fn future<T>() -> (FutureSlot<T>, ResponseFuture<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (FutureSlot { tx }, ResponseFuture { rx })
}

/// Write side of a [`ResponseFuture`]; resolving consumes it.
pub struct FutureSlot<T> {
    tx: SyncSender<Result<T>>,
}

impl<T> FutureSlot<T> {
    pub fn on_response(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn on_error_response(self, error: Error) {
        self.resolve(Err(error));
    }

    fn resolve(self, result: Result<T>) {
        if self.tx.try_send(result).is_err() {
            log::debug!("response future dropped before resolution");
        }
    }
}

/// Blocking handle on a request's outcome.
pub struct ResponseFuture<T> {
    rx: Receiver<Result<T>>,
}

impl<T> ResponseFuture<T> {
    /// Block until the request resolves, or until `timeout` elapses.
    /// `None` waits indefinitely.
    ///
    /// Must not be called on a thread the transport needs in order to
    /// complete the request.
    pub fn wait(self, timeout: Option<Duration>) -> Result<T> {
        let outcome = match timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => Error::Timeout(timeout),
                RecvTimeoutError::Disconnected => Error::Interrupted,
            })?,
            None => self.rx.recv().map_err(|_| Error::Interrupted)?,
        };
        outcome.map_err(|e| Error::Execution(Box::new(e)))
    }

    /// Non-blocking poll. `None` while the request is still in flight.
    pub fn try_wait(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome.map_err(|e| Error::Execution(Box::new(e)))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::Interrupted)),
        }
    }
}

pub enum Channel<T> {
    Callback(Box<dyn ResponseCallback<T>>),
    Future(FutureSlot<T>),
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Callback(_) => f.write_str("Callback"),
            Channel::Future(_) => f.write_str("Future"),
        }
    }
}

/// The channel bound to one request, plus a label used when nothing is bound.
pub struct Delivery<T> {
    label: String,
    channel: Option<Channel<T>>,
}

impl<T: 'static> Delivery<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            channel: None,
        }
    }

    pub fn bind(&mut self, channel: Channel<T>) -> Result<()> {
        if self.channel.is_some() {
            return Err(Error::ChannelAlreadyBound);
        }
        self.channel = Some(channel);
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.channel.is_some()
    }

    /// Hand the outcome to the bound channel. Without one, the outcome is
    /// logged and dropped.
    pub fn deliver(self, result: Result<T>) {
        match (self.channel, result) {
            (Some(Channel::Callback(cb)), Ok(value)) => cb.on_success(value),
            (Some(Channel::Callback(cb)), Err(err)) => cb.on_failure(err),
            (Some(Channel::Future(slot)), Ok(value)) => slot.on_response(value),
            (Some(Channel::Future(slot)), Err(err)) => slot.on_error_response(err),
            (None, Ok(_)) => log::debug!("{}: response dropped, no callback set", self.label),
            (None, Err(err)) => log::warn!(
                "{}: request failed with status {}, and no callback set for it: {}",
                self.label,
                err.status()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        thread,
        time::Instant,
    };

    use super::*;

    #[test]
    fn second_bind_is_rejected() {
        let (slot, _future) = future::<u32>();
        let mut delivery = Delivery::<u32>::new("GET http://example.com");
        delivery
            .bind(Channel::Callback(Box::new(|_: Result<u32>| {})))
            .unwrap();
        assert!(delivery.is_bound());

        let err = delivery.bind(Channel::Future(slot)).unwrap_err();
        assert!(matches!(err, Error::ChannelAlreadyBound));
    }

    #[test]
    fn callback_sees_exactly_one_outcome() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();

        let mut delivery = Delivery::<u32>::new("test");
        delivery
            .bind(Channel::Callback(Box::new(move |r: Result<u32>| {
                seen.lock().unwrap().push(r.map_err(|e| e.status()));
            })))
            .unwrap();
        delivery.deliver(Err(Error::Http {
            status: 404,
            body: None,
        }));

        assert_eq!(*calls.lock().unwrap(), vec![Err(Some(404))]);
    }

    #[test]
    fn unbound_failure_is_dropped() {
        Delivery::<u32>::new("test").deliver(Err(Error::Network("refused".into())));
        Delivery::<u32>::new("test").deliver(Ok(1));
    }

    #[test]
    fn future_resolves_across_threads() {
        let (slot, future) = future();
        thread::spawn(move || slot.on_response("done"));
        assert_eq!(future.wait(Some(Duration::from_secs(5))).unwrap(), "done");
    }

    #[test]
    fn future_failure_is_wrapped() {
        let (slot, future) = future::<()>();
        slot.on_error_response(Error::Http {
            status: 500,
            body: None,
        });
        let err = future.wait(None).unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn future_times_out() {
        let (_slot, future) = future::<()>();
        let start = Instant::now();
        let err = future.wait(Some(Duration::from_millis(50))).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn dropped_slot_interrupts() {
        let (slot, future) = future::<()>();
        assert!(future.try_wait().is_none());
        drop(slot);
        assert!(matches!(future.wait(None), Err(Error::Interrupted)));
    }
}
