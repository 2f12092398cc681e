//! Routing layer.
//!
//! Owns the address directory strategies and the per-message routing policy:
//! filter evaluation, fan-out, weighted round robin and flow-control
//! admission. Directory reads are lock-free snapshots; writes are rare and
//! published atomically.
//!
//! ```
//! use post_office::{Address, WildcardConfiguration};
//!
//! let wildcard = WildcardConfiguration::default();
//!
//! assert!(wildcard.matches(&Address::from("orders.#"), &Address::from("orders.eu.retail")));
//! assert!(!wildcard.matches(&Address::from("orders.*"), &Address::from("orders.eu.retail")));
//! ```

pub(crate) mod address_manager;
pub(crate) mod router;
pub(crate) mod simple_address_manager;
pub(crate) mod wildcard;
pub(crate) mod wildcard_address_manager;
