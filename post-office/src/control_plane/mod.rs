//! Control-plane layer.
//!
//! Owns structural transitions (destinations and bindings), failover
//! activation, the per-address send locks and the ordered recovery pipeline.
//! Every transition here runs inside the post office's structural critical
//! section.
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! use integration_test_utils::{InMemoryBroker, init_logging};
//! use post_office::{Address, NewBinding, PostOffice, PostOfficeConfig};
//!
//! init_logging();
//! let broker = InMemoryBroker::default();
//! let post_office =
//!     PostOffice::new("control-plane-doc", PostOfficeConfig::default(), broker.collaborators())
//!         .unwrap();
//!
//! post_office.add_binding(NewBinding::new("orders", "q1")).await.unwrap();
//! assert!(post_office.add_binding(NewBinding::new("orders", "q1")).await.is_err());
//! post_office.remove_binding("q1").await.unwrap();
//! assert!(post_office.remove_binding("q1").await.is_err());
//! assert!(post_office.bindings_for_address(&Address::from("orders")).is_empty());
//! # });
//! ```

pub(crate) mod activation;
pub(crate) mod binding_lifecycle;
pub(crate) mod recovery;
pub(crate) mod send_lock;
