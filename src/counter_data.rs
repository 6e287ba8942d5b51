//! # Remote Counter Polling
//!
//! This module refreshes [`CounterState`] from a remote JSON stats document.
//! It is built so that a flaky network can never take the display down.
//!
//! ## Data Source
//!
//! The document is a JSON object with one section per counter, each holding a
//! numeric field under a fixed key:
//!
//! ```json
//! {
//!   "matches_go":  { "counter": 7 },
//!   "matches_ffa": { "counter": 12 }
//! }
//! ```
//!
//! ## Poll Pipeline
//! 1. **Stamp**: record the attempt time before anything can fail
//! 2. **Fetch**: one GET with a bounded timeout ([`Fetcher`])
//! 3. **Parse**: the body must be a JSON object ([`CounterDocument`])
//! 4. **Assign**: every known counter is reassigned in one pass; a missing or
//!    unreadable field reads as zero
//!
//! ## Error Handling
//!
//! | failure                        | counters                        |
//! |--------------------------------|---------------------------------|
//! | transport error or timeout     | untouched (or zeroed, see [`FailurePolicy`]) |
//! | non-success HTTP status        | untouched (or zeroed)           |
//! | body is not a JSON object      | untouched (or zeroed)           |
//! | one section or field missing   | that counter becomes zero       |
//!
//! Every failure is absorbed by [`Poller`]: it is logged, counted and retried
//! on the next scheduled tick. Nothing propagates to the scheduler.

use crate::scheduler::{Millis, Work};
use crate::SharedCounters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures of a single fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request did not complete within its timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, TLS or protocol failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The async runtime backing the HTTP client could not be started
    #[error("runtime setup failed: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Reasons a poll tick left the counters unassigned.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("malformed response: expected a JSON object")]
    NotAnObject,
}

/// Raw result of a completed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking GET with a timeout.
pub trait Fetcher {
    fn fetch(&mut self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn fetch(&mut self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
        (**self).fetch(url, timeout)
    }
}

/// HTTP fetcher backed by reqwest on a current-thread tokio runtime.
///
/// Each fetch blocks the calling thread until the response body is in or the
/// timeout expires.
pub struct HttpFetcher {
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("segment-counter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { runtime, client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&mut self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(FetchResponse {
                status,
                body: body.to_vec(),
            })
        };

        // One deadline for connect, headers and body together
        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, request).await {
                Ok(result) => result.map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout(timeout)
                    } else {
                        FetchError::Http(e)
                    }
                }),
                Err(_) => Err(FetchError::Timeout(timeout)),
            }
        })
    }
}

/// A parsed stats document.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterDocument {
    sections: Map<String, Value>,
}

impl CounterDocument {
    /// Parse a response body. Anything other than a JSON object is malformed.
    pub fn parse(body: &[u8]) -> Result<Self, PollError> {
        match serde_json::from_slice::<Value>(body)? {
            Value::Object(sections) => Ok(Self { sections }),
            _ => Err(PollError::NotAnObject),
        }
    }

    /// Read `section.field` as an unsigned integer.
    ///
    /// Accepts JSON integers, integral non-negative floats and decimal
    /// strings. Anything else, including a missing section, is `None`.
    pub fn get_field(&self, section: &str, field: &str) -> Option<u64> {
        match self.sections.get(section)?.get(field)? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| {
                        f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64
                    })
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// What a failed poll does to the counters already on display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep showing the last good values until a poll succeeds
    #[default]
    Retain,
    /// Zero every counter
    Reset,
}

/// Where a counter's value lives in the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterBinding {
    pub name: String,
    pub section: String,
}

/// Poller bookkeeping, exposed for logs and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub successes: u64,
    pub consecutive_failures: u32,
}

/// Periodic task that refreshes the shared counters.
pub struct Poller<F> {
    fetcher: F,
    url: String,
    field: String,
    timeout: Duration,
    bindings: Vec<CounterBinding>,
    policy: FailurePolicy,
    counters: SharedCounters,
    stats: PollStats,
}

impl<F: Fetcher> Poller<F> {
    pub fn new(
        fetcher: F,
        url: impl Into<String>,
        field: impl Into<String>,
        timeout: Duration,
        bindings: Vec<CounterBinding>,
        counters: SharedCounters,
    ) -> Self {
        Self {
            fetcher,
            url: url.into(),
            field: field.into(),
            timeout,
            bindings,
            policy: FailurePolicy::default(),
            counters,
            stats: PollStats::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// One poll tick. Failures are logged and absorbed.
    pub fn poll(&mut self) {
        self.stats.last_attempt = Some(Utc::now());

        match self.fetch_document() {
            Ok(document) => self.apply(&document),
            Err(e) => {
                self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_add(1);
                log::warn!(
                    "Counter poll failed ({} in a row): {}",
                    self.stats.consecutive_failures,
                    e
                );
                if self.policy == FailurePolicy::Reset {
                    self.counters.borrow_mut().reset_all();
                    log::warn!("Counters reset to zero after failed poll");
                }
            }
        }
    }

    fn fetch_document(&mut self) -> Result<CounterDocument, PollError> {
        let response = self.fetcher.fetch(&self.url, self.timeout)?;
        if !response.is_success() {
            return Err(PollError::Status(response.status));
        }
        CounterDocument::parse(&response.body)
    }

    /// Reassign every counter from the document in a single pass.
    fn apply(&mut self, document: &CounterDocument) {
        let now = Utc::now();
        let mut missing = Vec::new();
        {
            let mut counters = self.counters.borrow_mut();
            counters.reassign(
                |name| {
                    let value = self
                        .bindings
                        .iter()
                        .find(|b| b.name == name)
                        .and_then(|b| document.get_field(&b.section, &self.field));
                    if value.is_none() {
                        missing.push(name.to_string());
                    }
                    value.unwrap_or(0)
                },
                now,
            );
            log::debug!("Counters updated: {:?}", counters.counters());
        }

        if !missing.is_empty() {
            log::debug!("Missing from response, shown as zero: {}", missing.join(", "));
        }
        if self.stats.consecutive_failures > 0 {
            log::info!(
                "Counter poll recovered after {} failures",
                self.stats.consecutive_failures
            );
        }
        self.stats.consecutive_failures = 0;
        self.stats.successes += 1;
        self.stats.last_success = Some(now);
    }
}

impl<F: Fetcher> Work for Poller<F> {
    fn run(&mut self, _now: Millis) {
        self.poll();
    }
}
