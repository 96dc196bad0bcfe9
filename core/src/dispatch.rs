//! The request dispatcher.
//!
//! # Design
//! Each dispatch creates one `InFlight` record and hands it to a single
//! driver task. The deadline is fixed when the request is dispatched, not
//! when the task first runs. The driver waits on the transport's completion
//! and the deadline together; the completion is always polled first, so a
//! result that was delivered before the task got to run still wins.
//! Whichever finishes drops the other, which aborts the connection or the
//! timer, and then calls `settle`: the single `Pending` to `Settled`
//! transition. `settle` releases the transport handle before running the
//! caller's callback. Nothing outlives the driver task and there is no
//! registry of requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::document::HttpDocument;
use crate::error::DispatchError;
use crate::request::{Callbacks, FailureCode, FailureDetail, RequestSpec, ResponseKind};
use crate::transport::{
    BoxFuture, CallbackTable, Completion, DirectTransport, RelayTransport, Started, Transport,
    TransportHandle,
};

/// Whether `dispatch` put a request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// The request had no URL; no callback will ever fire.
    Skipped,
    /// Exactly one callback will fire.
    Pending,
}

/// Routes each `RequestSpec` to the transport its response kind selects.
///
/// `dispatch` spawns onto the ambient tokio runtime and must be called from
/// within one.
#[derive(Clone)]
pub struct Dispatcher {
    direct: Arc<dyn Transport>,
    relay: Arc<dyn Transport>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::networked(reqwest::Client::new())
    }
}

impl Dispatcher {
    pub fn new(direct: Arc<dyn Transport>, relay: Arc<dyn Transport>) -> Self {
        Self { direct, relay }
    }

    /// Direct requests over `client`; relay scripts fetched with `client`
    /// and reporting to the process-wide callback table.
    pub fn networked(client: reqwest::Client) -> Self {
        let globals = CallbackTable::global().clone();
        let document = Arc::new(HttpDocument::new(client.clone(), globals.clone()));
        Self::new(
            Arc::new(DirectTransport::new(client)),
            Arc::new(RelayTransport::new(document, globals)),
        )
    }

    /// Start `spec`.
    ///
    /// A request without a URL is skipped silently. Otherwise the transport is
    /// started and raced against `spec.timeout`; errors returned here come
    /// from starting the transport and mean no callback will fire.
    pub fn dispatch(&self, mut spec: RequestSpec) -> Result<Dispatched, DispatchError> {
        let Some(url) = spec.target() else {
            debug!("dispatch skipped: no url");
            return Ok(Dispatched::Skipped);
        };
        debug!(url, kind = ?spec.response_kind, method = %spec.method, "dispatch");

        let transport = match spec.response_kind {
            ResponseKind::Json => self.direct.clone(),
            ResponseKind::ScriptRelay => self.relay.clone(),
        };
        let Started { handle, completion } = transport.start(&spec)?;
        let flight = InFlight::new(transport, handle, spec.take_callbacks());
        flight.arm(completion, spec.timeout);
        Ok(Dispatched::Pending)
    }
}

/// Lifecycle of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Settled,
}

enum Event {
    Completed(Completion),
    TimedOut,
}

struct InFlight {
    transport: Arc<dyn Transport>,
    state: State,
    handle: Option<TransportHandle>,
    callbacks: Option<Callbacks>,
}

impl InFlight {
    fn new(transport: Arc<dyn Transport>, handle: TransportHandle, callbacks: Callbacks) -> Self {
        Self {
            transport,
            state: State::Pending,
            handle: Some(handle),
            callbacks: Some(callbacks),
        }
    }

    /// Subscribe to both completion sources. The deadline counts from now.
    fn arm(self, completion: BoxFuture<Completion>, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        tokio::spawn(self.drive(completion, deadline));
    }

    async fn drive(mut self, completion: BoxFuture<Completion>, deadline: Instant) {
        // the losing side is dropped here, before settling
        let event = match tokio::time::timeout_at(deadline, completion).await {
            Ok(outcome) => Event::Completed(outcome),
            Err(_) => Event::TimedOut,
        };
        self.settle(event);
    }

    fn settle(&mut self, event: Event) {
        if self.state == State::Settled {
            trace!("late settlement suppressed");
            return;
        }
        self.state = State::Settled;

        if let Some(handle) = self.handle.take() {
            self.transport.release(handle);
        }
        let Some(callbacks) = self.callbacks.take() else {
            return;
        };

        match event {
            Event::Completed(Completion::Success(payload)) => {
                debug!("settled: success");
                (callbacks.on_success)(payload);
            }
            Event::Completed(Completion::Failed { status, message }) => {
                debug!(status, "settled: failure");
                (callbacks.on_failure)(FailureCode::Status(status), FailureDetail::new(message));
            }
            Event::TimedOut => {
                let code = self.transport.timeout_code();
                debug!(%code, "settled: timeout");
                (callbacks.on_failure)(code, FailureDetail::timeout());
            }
        }
    }
}

impl Drop for InFlight {
    /// A driver cancelled before settling (runtime shutdown) still retires
    /// its transport handle. No callback fires.
    fn drop(&mut self) {
        if self.state == State::Pending {
            self.state = State::Settled;
            if let Some(handle) = self.handle.take() {
                trace!("dropped while pending");
                self.transport.release(handle);
            }
        }
    }
}
