//! Status taxonomy shared by callers and callees.
//!
//! The gRPC code space is larger than what the folio services produce. This
//! module narrows it to the six outcomes a call can actually end with and folds
//! everything else (unavailable, unknown, data loss, ...) into
//! [`StatusCode::Internal`], so callers only ever branch on a closed set.

use core::fmt;
use tonic::{Code, Status};

/// Canonical outcome of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    InvalidArgument,
    NotFound,
    DeadlineExceeded,
    Cancelled,
    Internal,
}

impl StatusCode {
    /// Business outcomes are part of the API contract: the caller handles them
    /// and carries on. Everything else is a transport or internal fault.
    pub const fn is_business(self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::NotFound | Self::DeadlineExceeded | Self::Cancelled
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Cancelled => "CANCELED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl From<Code> for StatusCode {
    fn from(code: Code) -> Self {
        match code {
            Code::Ok => Self::Ok,
            Code::InvalidArgument => Self::InvalidArgument,
            Code::NotFound => Self::NotFound,
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            Code::Cancelled => Self::Cancelled,
            _ => Self::Internal,
        }
    }
}

impl From<StatusCode> for Code {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::Ok => Code::Ok,
            StatusCode::InvalidArgument => Code::InvalidArgument,
            StatusCode::NotFound => Code::NotFound,
            StatusCode::DeadlineExceeded => Code::DeadlineExceeded,
            StatusCode::Cancelled => Code::Cancelled,
            StatusCode::Internal => Code::Internal,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal status of a call: a code plus a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallStatus {
    pub code: StatusCode,
    pub message: String,
}

impl CallStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&Status> for CallStatus {
    fn from(status: &Status) -> Self {
        Self::new(status.code().into(), status.message())
    }
}

impl From<CallStatus> for Status {
    fn from(status: CallStatus) -> Self {
        Status::new(status.code.into(), status.message)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_transport_codes_fold_into_internal() {
        for code in [Code::Unavailable, Code::Unknown, Code::DataLoss, Code::Aborted] {
            assert_eq!(StatusCode::from(code), StatusCode::Internal);
        }
    }

    #[test]
    fn business_codes() {
        assert!(StatusCode::NotFound.is_business());
        assert!(StatusCode::InvalidArgument.is_business());
        assert!(StatusCode::DeadlineExceeded.is_business());
        assert!(StatusCode::Cancelled.is_business());
        assert!(!StatusCode::Internal.is_business());
        assert!(!StatusCode::Ok.is_business());
    }

    #[test]
    fn converts_from_tonic_status() {
        let status = Status::invalid_argument("Received an invalid number: 0");
        let call = CallStatus::from(&status);
        assert_eq!(call.code, StatusCode::InvalidArgument);
        assert_eq!(
            call.to_string(),
            "INVALID_ARGUMENT: Received an invalid number: 0"
        );
        assert_eq!(Status::from(call).code(), Code::InvalidArgument);
    }
}
