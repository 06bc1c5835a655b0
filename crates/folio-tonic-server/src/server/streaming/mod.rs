//! Long-running halves of the streaming calls.
//!
//! - [`coordinator`]: produces server-streaming responses.
//! - [`processor`]: consumes client streams and answers bidirectional ones.

pub mod coordinator;
pub mod processor;
