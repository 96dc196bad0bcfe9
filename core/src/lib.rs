//! Request dispatcher over two transports.
//!
//! # Overview
//! `Dispatcher::dispatch` takes a declarative `RequestSpec` and runs it over
//! either a direct request/response transport or a cross-origin script
//! relay, selected by `ResponseKind`. Whichever transport runs, exactly one
//! of the request's `on_success` / `on_failure` callbacks fires, exactly once,
//! after the request's resources are released.
//!
//! # Design
//! - `query` builds and merges percent-encoded query strings.
//! - `transport::direct` is abortable and status-coded; a timeout drops the
//!   in-flight request and reports `408`.
//! - `transport::relay` injects a script through a `Document` and waits for
//!   it to call a one-time token on the `CallbackTable`; a timeout retires
//!   the token so a late call does nothing.
//! - `dispatch` races the transport's completion against the timeout and
//!   guards settlement with a `Pending`/`Settled` state machine.
//! - `util` holds the cookie jar, throttle, dedup and e-mail check helpers.

pub mod dispatch;
pub mod document;
pub mod error;
pub mod http;
pub mod query;
pub mod request;
pub mod transport;
pub mod util;

pub use dispatch::{Dispatched, Dispatcher, State};
pub use document::{Document, HttpDocument, ScriptId};
pub use error::DispatchError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{append_query, encode, param, Params, Scalar};
pub use request::{
    FailureCode, FailureDetail, Payload, RequestSpec, ResponseKind, DEFAULT_CONTENT_TYPE,
    DEFAULT_RELAY_PARAM, DEFAULT_TIMEOUT,
};
pub use transport::{CallbackTable, Completion, DirectTransport, RelayTransport, Transport, TransportHandle};
pub use util::CookieJar;
