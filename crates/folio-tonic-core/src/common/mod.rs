//! Building blocks shared by the folio servers and clients.
//!
//! - [`status`] - the closed set of call outcomes.
//! - [`error`] - the `Error` enum and its `tonic::Status` mapping.
//! - [`stream`] - ordered message streams with explicit termination.
//! - [`signal`] - single-fire completion signal.
//! - [`deadline`] - per-call deadline and cancellation.
//! - [`types`] - call patterns and defaults.

pub mod deadline;
pub mod error;
pub mod signal;
pub mod status;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
