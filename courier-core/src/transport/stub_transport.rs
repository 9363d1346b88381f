use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    thread,
};

use crate::error::Error;

use super::{Completion, RawResponse, Transport, TransportRequest};

/// Canned outcome for a URL.
#[derive(Debug, Clone)]
pub enum StubReply {
    Respond(RawResponse),
    /// Complete with [`Error::Network`].
    Fail(String),
    /// Keep the completion forever without calling it.
    Hang,
}

/// In-memory [`Transport`] for tests.
///
/// Replies are looked up by full URL and delivered from a freshly spawned
/// thread, like a real worker pool would. Unknown URLs get a 404.
#[derive(Default, Clone)]
pub struct StubTransport {
    replies: Arc<Mutex<HashMap<String, StubReply>>>,
    default_headers: HashMap<String, String>,
    seen: Arc<Mutex<Vec<TransportRequest>>>,
    parked: Arc<Mutex<Vec<Completion>>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn reply(&self, url: &str, reply: StubReply) -> &Self {
        self.replies
            .lock()
            .expect("poisoned")
            .insert(url.to_string(), reply);
        self
    }

    /// Answer `url` with `status` and a JSON body.
    pub fn json(&self, url: &str, status: u16, body: &str) -> &Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        self.reply(
            url,
            StubReply::Respond(RawResponse::new(status, headers, body.as_bytes().to_vec())),
        )
    }

    /// Every request enqueued so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().expect("poisoned").clone()
    }
}

impl Transport for StubTransport {
    fn enqueue(&self, request: TransportRequest, completion: Completion) {
        let reply = self
            .replies
            .lock()
            .expect("poisoned")
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| StubReply::Respond(RawResponse::new(404, HashMap::new(), vec![])));
        self.seen.lock().expect("poisoned").push(request);

        match reply {
            StubReply::Respond(response) => {
                thread::spawn(move || completion(Ok(response)));
            }
            StubReply::Fail(message) => {
                thread::spawn(move || completion(Err(Error::Network(message))));
            }
            StubReply::Hang => self.parked.lock().expect("poisoned").push(completion),
        }
    }

    fn default_headers(&self) -> HashMap<String, String> {
        self.default_headers.clone()
    }
}
