//! # Call shapes and shared constants
//!
//! Every RPC exposed by the folio services belongs to exactly one of the four
//! gRPC interaction patterns. The pattern decides how many messages travel in
//! each direction and who signals termination:
//!
//! | Pattern           | Requests | Responses | Sender closes          |
//! |-------------------|----------|-----------|------------------------|
//! | `Unary`           | 1        | 1         | n/a                    |
//! | `ServerStreaming` | 1        | 0..n      | server (end-of-stream) |
//! | `ClientStreaming` | 0..n     | 1         | client (done sending)  |
//! | `BidiStreaming`   | 0..n     | 0..n      | each side for its own  |

use core::fmt;
use core::time::Duration;

/// The interaction pattern of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallPattern {
    Unary,
    ServerStreaming,
    ClientStreaming,
    BidiStreaming,
}

impl CallPattern {
    /// Stable lowercase label, used for log fields and metric attributes.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ServerStreaming => "server_streaming",
            Self::ClientStreaming => "client_streaming",
            Self::BidiStreaming => "bidi_streaming",
        }
    }
}

impl fmt::Display for CallPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default capacity of the bounded channel behind a message stream.
///
/// Small on purpose: a full channel is what turns a slow consumer into
/// backpressure on its producer.
pub const DEFAULT_STREAM_BUFFER: usize = 8;

/// Default port shared by the book and calculator services.
pub const DEFAULT_PORT: u16 = 8989;

/// Default pause between two simulated units of work in `Sum`.
pub const DEFAULT_SUM_UNIT: Duration = Duration::from_secs(1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(CallPattern::BidiStreaming.to_string(), "bidi_streaming");
        assert_eq!(CallPattern::Unary.as_str(), "unary");
    }
}
