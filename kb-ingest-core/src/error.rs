//! Error taxonomy shared by the core workflow and the service clients.
//!
//! - [`ServiceError`]: anything that went wrong talking to object storage, the
//!   knowledge-base control plane or the retrieval runtime.
//! - [`InputError`]: anything the operator supplied that cannot be used (an
//!   unreadable document, a non-numeric menu selection).
//! - [`TimerError`]: misuse of [`crate::timer::Timer`].
//!
//! Callers in this crate catch these at the call site, log them and turn them
//! into a benign outcome; nothing here is retried automatically.

use std::path::PathBuf;

/// Failure reported by (or while reaching) an external service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with a non-success HTTP status.
    #[error("{operation} failed (HTTP {status}): {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },
    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    /// The response arrived but could not be decoded.
    #[error("{operation} returned an unreadable response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

/// Operator input that cannot be acted on.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("cannot read {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a number: {0:?}")]
    NotANumber(String),
    #[error("no input available")]
    NoInput,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("timer stopped without a matching start")]
    NotRunning,
}

/// Why a submission ended before its job reached a terminal state.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}
