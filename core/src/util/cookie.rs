//! An in-memory cookie jar.
//!
//! # Design
//! The jar models the page's cookie string: names and values are stored
//! percent-encoded, an optional expiry is kept per cookie, and reads skip
//! anything already expired. Clones share the same jar, so a jar handed to
//! the direct transport sees later writes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::query::{decode_component, encode_component};

const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone)]
struct Cookie {
    name: String,
    value: String,
    expires: Option<DateTime<Utc>>,
}

impl Cookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(true, |at| at > now)
    }
}

/// Shared name → value cookie store.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Arc<Mutex<Vec<Cookie>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Cookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decoded value of `name`, if set and not expired.
    pub fn get(&self, name: &str) -> Option<String> {
        let encoded = encode_component(name);
        let now = Utc::now();
        self.lock()
            .iter()
            .find(|c| c.name == encoded && c.is_live(now))
            .map(|c| decode_component(&c.value))
    }

    /// Set `name` to `value`, optionally expiring after `days`.
    ///
    /// Returns the cookie string that was written, e.g.
    /// `theme=dark;expires=Tue, 20 Oct 2026 10:00:00 GMT`. A negative
    /// lifetime writes an expired cookie, which removes it.
    pub fn set(&self, name: &str, value: &str, days: Option<i64>) -> String {
        let cookie = Cookie {
            name: encode_component(name),
            value: encode_component(value),
            expires: days.map(|d| Utc::now() + Duration::days(d)),
        };
        let mut written = format!("{}={}", cookie.name, cookie.value);
        if let Some(at) = cookie.expires {
            written.push_str(";expires=");
            written.push_str(&at.format(EXPIRES_FORMAT).to_string());
        }

        let now = Utc::now();
        let mut cookies = self.lock();
        cookies.retain(|c| c.name != cookie.name && c.is_live(now));
        if cookie.is_live(now) {
            cookies.push(cookie);
        }
        written
    }

    /// Expire `name`.
    pub fn remove(&self, name: &str) {
        self.set(name, "", Some(-1));
    }

    /// `Cookie` request header for the live cookies, if any.
    pub fn header(&self) -> Option<String> {
        let now = Utc::now();
        let header = self
            .lock()
            .iter()
            .filter(|c| c.is_live(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        (!header.is_empty()).then_some(header)
    }
}
