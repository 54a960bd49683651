//! Cached administrator session

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, SET_COOKIE};

/// Cookies captured from an admin login
#[derive(Debug, Clone)]
pub(crate) struct AdminSession {
    cookie: String,
    established_at: Instant,
}

impl AdminSession {
    pub(crate) fn new(cookie: String) -> Self {
        Self {
            cookie,
            established_at: Instant::now(),
        }
    }

    /// Value for the `Cookie` request header
    pub(crate) fn cookie(&self) -> &str {
        &self.cookie
    }

    pub(crate) fn is_fresh(&self, ttl: Duration) -> bool {
        self.established_at.elapsed() < ttl
    }
}

/// Collapse `Set-Cookie` headers into a single `Cookie` header value
pub(crate) fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect::<Vec<_>>()
        .join("; ")
}
