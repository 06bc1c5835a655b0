//! Single-fire completion signal.
//!
//! One task owns the [`Completer`] and writes the outcome exactly once; the
//! initiating caller owns the [`Completion`] and reads it exactly once. Both
//! halves are consumed by use, so the single-writer/single-reader discipline
//! is enforced by ownership rather than by a lock.

use crate::common::error::{Error, Result};
use tokio::sync::oneshot;

/// Write half of a completion signal.
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<T>,
}

/// Read half of a completion signal.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

/// Creates a connected completer/completion pair.
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx })
}

impl<T> Completer<T> {
    /// Fires the signal. Returns `false` if nobody is waiting any more.
    pub fn complete(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

impl<T> Completion<T> {
    /// Waits for the signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the completer was dropped without
    /// firing, e.g. because its task panicked or was aborted.
    pub async fn wait(self) -> Result<T> {
        self.rx.await.map_err(|_| Error::Internal {
            context: "completion signal dropped before it fired".to_string(),
        })
    }
}
