//! Runtime integration layer.
//!
//! Background work runs on dedicated named threads with their own
//! current-thread tokio runtime, so it never competes with the embedding
//! application's executor.

pub(crate) mod expiry_runtime;
