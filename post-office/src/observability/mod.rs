//! Observability vocabulary.
//!
//! Every event the crate emits carries `event = <name from [`events`]>` and a
//! `component` field naming the emitting module.

pub mod events;
