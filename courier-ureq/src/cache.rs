use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use courier_core::RawResponse;

/// Bounded in-memory store of successful GET responses, keyed by full URL.
///
/// Only responses that announce a freshness lifetime (`Cache-Control:
/// max-age` or `Expires`) are stored, and only until that lifetime ends.
/// `no-store` and `no-cache` responses are never stored. The oldest entry is
/// evicted first.
pub struct ResponseCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
}

struct Entry {
    response: RawResponse,
    expires_at: Instant,
}

impl Inner {
    fn remove(&mut self, url: &str) {
        if self.entries.remove(url).is_some() {
            self.order.retain(|key| key != url);
        }
    }
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Fresh entry for `url`, if any. Expired entries are dropped on the way.
    pub fn get(&self, url: &str) -> Option<RawResponse> {
        let mut inner = self.inner.lock().expect("poisoned");
        match inner.entries.get(url) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.response.clone());
            }
            Some(_) => {}
            None => return None,
        }
        log::debug!("GET {url}: cached response expired");
        inner.remove(url);
        None
    }

    /// Store `response` if its headers allow it. Returns whether it was stored.
    pub fn insert(&self, url: String, response: RawResponse) -> bool {
        let lifetime = freshness_lifetime(&response, Utc::now());
        let mut inner = self.inner.lock().expect("poisoned");

        let Some(lifetime) = lifetime.filter(|_| self.capacity > 0) else {
            inner.remove(&url);
            return false;
        };

        let entry = Entry {
            response,
            expires_at: Instant::now() + lifetime,
        };
        if inner.entries.insert(url.clone(), entry).is_none() {
            inner.order.push_back(url);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How long `response` may be served from the cache. `None` when it must not
/// be stored at all.
fn freshness_lifetime(response: &RawResponse, now: DateTime<Utc>) -> Option<Duration> {
    let mut max_age = None;
    if let Some(cache_control) = response.header("cache-control") {
        for directive in cache_control.split(',') {
            let (name, value) = match directive.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim().trim_matches('"'))),
                None => (directive.trim(), None),
            };
            if name.eq_ignore_ascii_case("no-store") || name.eq_ignore_ascii_case("no-cache") {
                return None;
            }
            if name.eq_ignore_ascii_case("max-age") {
                max_age = value.and_then(|v| v.parse::<u64>().ok());
            }
        }
    }

    // max-age takes precedence over Expires
    if let Some(seconds) = max_age {
        return Some(Duration::from_secs(seconds)).filter(|d| !d.is_zero());
    }

    let expires = parse_http_date(response.header("expires")?)?;
    let date = response
        .header("date")
        .and_then(parse_http_date)
        .unwrap_or(now);
    (expires - date).to_std().ok().filter(|d| !d.is_zero())
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
