//! Data-plane layer.
//!
//! Moves already-routed references into queues and reschedules them. Nothing
//! here consults the address directory; routing decisions are final by the
//! time a reference reaches this layer.

pub(crate) mod delivery;
pub(crate) mod scheduling;
