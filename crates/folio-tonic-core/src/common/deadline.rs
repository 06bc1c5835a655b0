//! Per-call deadline and cancellation.
//!
//! A [`CallContext`] couples the optional absolute deadline a caller attached
//! to a call with a [`CancellationToken`] that fires when the call is aborted
//! from the outside (server shutdown, caller gone). Long-running handlers
//! check it at every unit of work:
//!
//! ```rust,ignore
//! for unit in plan {
//!     ctx.checkpoint()?;          // cheap poll
//!     ctx.pause(unit_cost).await?; // cancellation-aware wait
//!     unit.apply();
//! }
//! ```
//!
//! A call that runs past its deadline fails with
//! [`Error::DeadlineExceeded`]; one whose token fires fails with
//! [`Error::RequestCancelled`]. Neither returns a stale result.

use crate::common::error::{Error, Result};
use core::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Deadline and cancellation state of one call.
#[derive(Clone, Debug)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    pub const fn new(deadline: Option<Instant>, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration, cancel: CancellationToken) -> Self {
        Self::new(Some(Instant::now() + timeout), cancel)
    }

    /// Builds the context for an inbound call from its `grpc-timeout` header.
    ///
    /// `cancel` should be a child of the service-wide shutdown token so that a
    /// shutdown reaches every in-flight call. A missing or malformed header
    /// means "no deadline".
    pub fn from_metadata(metadata: &MetadataMap, cancel: CancellationToken) -> Self {
        let deadline = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout)
            .map(|timeout| Instant::now() + timeout);
        Self::new(deadline, cancel)
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Polls for cancellation without waiting.
    ///
    /// # Errors
    ///
    /// [`Error::RequestCancelled`] if the token fired,
    /// [`Error::DeadlineExceeded`] if the deadline is in the past.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::RequestCancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Waits for `duration`, returning early with an error as soon as the
    /// call is cancelled or its deadline passes.
    ///
    /// # Errors
    ///
    /// Same as [`CallContext::checkpoint`].
    pub async fn pause(&self, duration: Duration) -> Result<()> {
        self.checkpoint()?;
        let wake = Instant::now() + duration;

        match self.deadline {
            Some(deadline) if deadline <= wake => {
                tokio::select! {
                    () = self.cancel.cancelled() => Err(Error::RequestCancelled),
                    () = tokio::time::sleep_until(deadline) => Err(Error::DeadlineExceeded),
                }
            }
            _ => {
                tokio::select! {
                    () = self.cancel.cancelled() => Err(Error::RequestCancelled),
                    () = tokio::time::sleep_until(wake) => Ok(()),
                }
            }
        }
    }
}

/// Parses a `grpc-timeout` value: up to eight ASCII digits followed by one of
/// the units `H`, `M`, `S`, `m`, `u`, `n`.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len().checked_sub(1)?);
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}
