//! Typed error taxonomy for the engine.
//!
//! Each layer gets its own enum instead of a single catch-all error, so
//! callers can match on the handful of outcomes that actually matter to
//! them (a timeout is not the same as a protocol violation). Invariant
//! violations (malformed population state at construction time) are the
//! one category that is still allowed to panic rather than return a
//! `Result` — see `EngineError`.

use thiserror::Error;

/// Errors from `BoundedBufferWithId<T>::push_front`/`pop_back`.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("buffer operation timed out")]
    TimedOut,
}

/// Errors from `Broker<T>::enrol`/`get`/`put`.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker operation timed out")]
    TimedOut,
    #[error("no raw or processed queue registered under port {0}")]
    PortNotFound(u64),
    #[error("broker port id space exhausted (max {0})")]
    MaxPortIdExceeded(u64),
}

/// Errors from wire (de)serialization and session framing.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("expected {expected} byte payload, got {got}")]
    ShortPayload { expected: usize, got: usize },
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Errors from `Client`'s connect/retry/stall state machine.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("exhausted connection attempts without reaching the server")]
    ConnectExhausted,
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("exceeded maximum consecutive stalls waiting for work")]
    StallLimitReached,
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Invariant violations surfaced at population/individual construction
/// boundaries. Category 3 of the taxonomy: these are pre-conditions, not
/// runtime conditions, so callers that hit them are expected to fix the
/// calling code rather than handle the error at runtime.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid population: {0}")]
    InvalidPopulation(String),
    #[error("individual carries no payload")]
    EmptyIndividual,
}

impl From<BufferError> for BrokerError {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::TimedOut => BrokerError::TimedOut,
        }
    }
}
