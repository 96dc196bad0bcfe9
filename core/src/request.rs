//! Caller-facing request description and settlement values.
//!
//! # Design
//! A `RequestSpec` is consumed by a single dispatch. Its callbacks are
//! `FnOnce`, so the compiler already rules out a second invocation; the
//! dispatcher's state machine decides which one runs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::http::HttpMethod;
use crate::query::Params;

/// Default time before a request is failed with a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default `Content-Type` for direct requests.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Default name of the query parameter carrying the relay callback name.
pub const DEFAULT_RELAY_PARAM: &str = "callback";

/// Which transport carries the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseKind {
    /// Direct request/response exchange.
    #[default]
    Json,
    /// Cross-origin script relay with a named global callback.
    ScriptRelay,
}

impl FromStr for ResponseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseKind::Json),
            "jsonp" | "relay" => Ok(ResponseKind::ScriptRelay),
            other => Err(format!("unknown response kind: {other}")),
        }
    }
}

/// Value handed to the success callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw response content from the direct transport.
    Text(String),
    /// Value the relay script passed to its callback.
    Json(serde_json::Value),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Json(_) => None,
        }
    }

    /// Parse the payload as JSON. Relay payloads are already JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Payload::Text(text) => serde_json::from_str(text),
            Payload::Json(value) => Ok(value.clone()),
        }
    }
}

/// First argument of the failure callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    /// HTTP status from the direct transport. `408` marks a timeout and `0`
    /// a request that never produced a status.
    Status(u16),
    /// The relay callback was not invoked in time. The relay has no status
    /// channel, so this is distinct from any HTTP code.
    RelayTimeout,
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCode::Status(code) => write!(f, "{code}"),
            FailureCode::RelayTimeout => f.write_str("relay timeout"),
        }
    }
}

/// Second argument of the failure callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub message: String,
}

impl FailureDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new("timeout")
    }
}

pub type SuccessFn = Box<dyn FnOnce(Payload) + Send + 'static>;
pub type FailureFn = Box<dyn FnOnce(FailureCode, FailureDetail) + Send + 'static>;

/// The terminal callback pair of one request.
pub struct Callbacks {
    pub on_success: SuccessFn,
    pub on_failure: FailureFn,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            on_success: Box::new(|_| {}),
            on_failure: Box::new(|_, _| {}),
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

/// Declarative description of one request.
///
/// ```
/// use dispatch_core::{Params, RequestSpec};
///
/// let spec = RequestSpec::new("http://localhost:3000/search")
///     .data(Params::new().with("q", "cat").with("page", 1))
///     .timeout_ms(2_000)
///     .on_success(|payload| println!("{payload:?}"));
/// assert_eq!(spec.url.as_deref(), Some("http://localhost:3000/search"));
/// ```
#[derive(Debug)]
pub struct RequestSpec {
    /// Target URL. A request without one is never dispatched.
    pub url: Option<String>,
    pub method: HttpMethod,
    pub response_kind: ResponseKind,
    pub body: Option<Params>,
    pub content_type: String,
    pub relay_param: String,
    pub timeout: Duration,
    callbacks: Callbacks,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            url: None,
            method: HttpMethod::Get,
            response_kind: ResponseKind::Json,
            body: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            relay_param: DEFAULT_RELAY_PARAM.to_string(),
            timeout: DEFAULT_TIMEOUT,
            callbacks: Callbacks::default(),
        }
    }
}

impl RequestSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn response_kind(mut self, kind: ResponseKind) -> Self {
        self.response_kind = kind;
        self
    }

    pub fn data(mut self, body: Params) -> Self {
        self.body = Some(body);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn relay_param(mut self, name: impl Into<String>) -> Self {
        self.relay_param = name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_ms(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    pub fn on_success(mut self, f: impl FnOnce(Payload) + Send + 'static) -> Self {
        self.callbacks.on_success = Box::new(f);
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(FailureCode, FailureDetail) + Send + 'static) -> Self {
        self.callbacks.on_failure = Box::new(f);
        self
    }

    /// The URL, if present and non-empty.
    pub fn target(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }

    /// Move the callbacks out, leaving no-ops behind.
    pub fn take_callbacks(&mut self) -> Callbacks {
        std::mem::take(&mut self.callbacks)
    }
}
