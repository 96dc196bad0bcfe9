//! Error types for the request dispatcher.
//!
//! # Design
//! Only synchronous misuse is reported through `DispatchError`. Everything
//! that happens after a request is in flight (status failures, timeouts,
//! transport errors) is delivered to the caller's failure callback instead,
//! so no error ever crosses the asynchronous boundary.

use std::fmt;

/// Errors returned synchronously by `Dispatcher::dispatch` and the transports.
#[derive(Debug)]
pub enum DispatchError {
    /// The request body could not be serialized for the wire.
    SerializationError(String),

    /// No free relay callback identifier could be generated.
    RelayTokenExhausted,

    /// A relay callback identifier is already registered and live.
    RelayTokenInUse(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::SerializationError(msg) => {
                write!(f, "serialization failed: {msg}")
            }
            DispatchError::RelayTokenExhausted => {
                write!(f, "could not allocate a unique relay callback identifier")
            }
            DispatchError::RelayTokenInUse(token) => {
                write!(f, "relay callback identifier already in use: {token}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}
