//! Call admission and graceful shutdown.
//!
//! Every handler asks the [`CallTracker`] for a [`CallGuard`] before doing any
//! work. The guard counts the call as in flight until it is dropped, hands out
//! a cancellation token tied to server shutdown, and records per-call metrics.
//!
//! Shutdown runs in three phases: refuse new calls, wait (bounded) for the
//! in-flight ones to drain, then cancel whatever is left.

use crate::server::telemetry::{
    decrement_calls_inflight, increment_call_errors, increment_calls, increment_calls_inflight,
    record_call_duration,
};
use core::time::Duration;
use folio_tonic_core::{Error, Result, deadline::CallContext, types::CallPattern};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tonic::{Status, metadata::MetadataMap};

/// Shared admission state for every call the server runs.
#[derive(Debug)]
pub struct CallTracker {
    accepting: AtomicBool,
    inflight: AtomicUsize,
    shutdown_token: CancellationToken,
    drain_timeout: Duration,
}

impl CallTracker {
    pub fn new(drain_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            accepting: AtomicBool::new(true),
            inflight: AtomicUsize::new(0),
            shutdown_token: CancellationToken::new(),
            drain_timeout,
        })
    }

    /// Admits a call.
    ///
    /// # Errors
    ///
    /// [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn begin(self: &Arc<Self>, pattern: CallPattern, method: &'static str) -> Result<CallGuard> {
        if !self.accepting.load(Ordering::Acquire) {
            #[cfg(feature = "tracing")]
            tracing::debug!(method, "Refusing call during shutdown");
            return Err(Error::ServiceShutdown);
        }

        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_calls(pattern);
        increment_calls_inflight();

        Ok(CallGuard {
            tracker: Arc::clone(self),
            pattern,
            method,
            started: Instant::now(),
            token: self.shutdown_token.child_token(),
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Stops admitting calls, waits up to the drain timeout for running ones,
    /// then cancels the rest.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new calls ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new calls");
        self.accepting.store(false, Ordering::Release);

        // === Phase 1: Wait for in-flight calls to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drained = timeout(self.drain_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight calls drained");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Graceful drain timed out ({} calls still active)", self.inflight());
            }
        }

        // === Phase 2: Cancel whatever is left ===
        self.shutdown_token.cancel();

        #[cfg(feature = "tracing")]
        tracing::info!("Call tracker shutdown complete");
    }
}

/// One admitted call. Dropping it marks the call as finished.
#[derive(Debug)]
pub struct CallGuard {
    tracker: Arc<CallTracker>,
    pattern: CallPattern,
    method: &'static str,
    started: Instant,
    token: CancellationToken,
}

impl CallGuard {
    pub const fn method(&self) -> &'static str {
        self.method
    }

    /// Cancelled when the server gives up on in-flight calls.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Execution context bounded by the caller's `grpc-timeout`, if any.
    pub fn context(&self, metadata: &MetadataMap) -> CallContext {
        CallContext::from_metadata(metadata, self.token())
    }

    /// Records a failed call and converts the error for the wire.
    pub fn fail(&self, err: Error) -> Status {
        increment_call_errors(err.code());
        if err.is_business() {
            #[cfg(feature = "tracing")]
            tracing::debug!(method = self.method, "{err}");
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(method = self.method, "{err}");
        }
        err.into()
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.tracker.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_calls_inflight();
        record_call_duration(self.pattern, self.started.elapsed().as_secs_f64() * 1_000.0);
    }
}
