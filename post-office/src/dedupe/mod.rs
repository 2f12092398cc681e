//! Duplicate detection layer.
//!
//! One bounded [`DuplicateIdCache`] exists per address. Caches are created
//! lazily on first request and installed with a lock-free install-if-absent,
//! so the common "already exists" path never takes a lock.

pub(crate) mod cache_table;
pub mod duplicate_id_cache;
