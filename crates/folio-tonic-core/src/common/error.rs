//! Error types for the folio call layer.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable and reportable failure of a call, on either side of the wire.
//! It converts into `tonic::Status` for servers and back from `tonic::Status`
//! for clients, so a failure keeps its classification end to end.
//!
//! ## Error Cases
//! - `NotFound`: No record matched the lookup.
//! - `InvalidRequest`: An operand or field was rejected.
//! - `DeadlineExceeded`: The call's deadline elapsed before it finished.
//! - `RequestCancelled`: The caller (or the server shutting down) aborted.
//! - `ChannelError`: A message stream lost its peer mid-call.
//! - `Internal`: Anything else reported by the remote side.
//! - `Transport`: The connection itself could not be established.
//! - `ServiceShutdown`: A call arrived while the service was shutting down.

use crate::common::status::{CallStatus, StatusCode};
use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the folio services and their callers.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The lookup found nothing; `what` is the message shown to the caller.
    #[error("{what}")]
    NotFound { what: String },

    /// The request was malformed or an operand was rejected.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The deadline elapsed before the call produced its result.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The call was aborted before it produced its result.
    #[error("Request cancelled")]
    RequestCancelled,

    /// Internal channel send/receive failure (e.g. the peer went away).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// A failure the taxonomy has no better name for.
    #[error("Internal error: {context}")]
    Internal { context: String },

    /// Connecting to the remote endpoint failed.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Where this error falls in the status taxonomy.
    pub const fn code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::InvalidRequest { .. } => StatusCode::InvalidArgument,
            Self::DeadlineExceeded => StatusCode::DeadlineExceeded,
            Self::RequestCancelled => StatusCode::Cancelled,
            Self::ChannelError { .. }
            | Self::Internal { .. }
            | Self::Transport { .. }
            | Self::ServiceShutdown => StatusCode::Internal,
        }
    }

    /// `true` for outcomes the caller is expected to handle and continue
    /// from; `false` for faults that should be logged and abort the call.
    pub const fn is_business(&self) -> bool {
        self.code().is_business()
    }

    pub fn status(&self) -> CallStatus {
        CallStatus::new(self.code(), self.to_string())
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { what } => Status::not_found(what),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::DeadlineExceeded => Status::deadline_exceeded("Deadline exceeded"),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::Internal { context } => Status::internal(context),
            Error::Transport { context } => Status::unavailable(context),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::NotFound => Self::NotFound { what: message },
            Code::InvalidArgument => Self::InvalidRequest { reason: message },
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            Code::Cancelled => Self::RequestCancelled,
            Code::Unavailable if message == "Service is shutting down" => Self::ServiceShutdown,
            code => Self::Internal {
                context: format!("{code:?}: {message}"),
            },
        }
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Self::Transport {
            context: err.to_string(),
        }
    }
}
