//! Transports that carry a `RequestSpec` to its destination.
//!
//! # Design
//! A transport only knows how to start a request and how to release what it
//! allocated. Starting returns a `TransportHandle` naming those resources and
//! a future that resolves when the transport itself observes completion. The
//! dispatcher races that future against the timeout; dropping the future is
//! how the direct transport aborts its connection, and `release` is how the
//! relay transport retracts its callback and script.

pub mod direct;
pub mod relay;

use std::future::Future;
use std::pin::Pin;

use crate::document::ScriptId;
use crate::error::DispatchError;
use crate::request::{FailureCode, Payload, RequestSpec};

pub use direct::DirectTransport;
pub use relay::{CallbackTable, RelayTransport};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What a transport observed when it finished on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Success(Payload),
    Failed { status: u16, message: String },
}

/// Resources a started request holds until it settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportHandle {
    /// The connection lives inside the completion future.
    Direct,
    /// A registered callback token and the script that will call it.
    Relay { token: String, script: ScriptId },
}

/// A request that has been handed to a transport.
pub struct Started {
    pub handle: TransportHandle,
    pub completion: BoxFuture<Completion>,
}

impl std::fmt::Debug for Started {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Started")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// One concrete mechanism for carrying a request.
pub trait Transport: Send + Sync {
    /// Begin the request. Errors here are synchronous misuse.
    fn start(&self, spec: &RequestSpec) -> Result<Started, DispatchError>;

    /// Release the handle's resources. Must tolerate handles whose
    /// resources are already gone.
    fn release(&self, handle: TransportHandle);

    /// Failure code reported when the timeout wins the race.
    fn timeout_code(&self) -> FailureCode;
}
