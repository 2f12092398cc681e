/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # post-office
//!
//! `post-office` is the routing-and-binding core of a message broker. It maps
//! addresses to the queues bound to them, decides which queues receive each
//! message, enforces flow control, and keeps per-address duplicate detection
//! and send gating. Storage, paging, queues and management are supplied by
//! the embedding broker through the traits in [`collaborators`].
//!
//! Typical usage is API-first and centered on [`PostOffice`].
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! use std::sync::Arc;
//! use integration_test_utils::InMemoryBroker;
//! use post_office::{Address, NewBinding, PostOffice, PostOfficeConfig, ServerMessage};
//!
//! let broker = InMemoryBroker::default();
//! let config = PostOfficeConfig {
//!     message_expiry_scan_period_ms: 0,
//!     ..Default::default()
//! };
//! let post_office = PostOffice::new("doc", config, broker.collaborators()).unwrap();
//! post_office.start().await.unwrap();
//!
//! post_office
//!     .add_binding(NewBinding::new("orders", "audit").fanout(true))
//!     .await
//!     .unwrap();
//! post_office.add_binding(NewBinding::new("orders", "worker-1")).await.unwrap();
//! post_office.add_binding(NewBinding::new("orders", "worker-2")).await.unwrap();
//!
//! // Every fan-out binding gets a copy; exactly one round-robin binding does.
//! let message = Arc::new(ServerMessage::new(1, "orders"));
//! let references = post_office.route(&message).await.unwrap();
//! assert_eq!(references.len(), 2);
//! post_office.deliver(references);
//!
//! assert_eq!(broker.queue("audit").unwrap().len(), 1);
//! assert_eq!(post_office.bindings_for_address(&Address::from("orders")).len(), 3);
//! post_office.stop().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`PostOffice`] and its configuration
//! - Routing: address directory strategies and the per-message routing policy
//! - Control plane: destination/binding lifecycle, activation, send locks, recovery
//! - Data plane: delivery and scheduled redelivery of routed references
//! - Dedupe: per-address duplicate id caches
//! - Runtime: the background expiry scanner
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber.
//! Binaries and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

mod address;
pub use address::Address;

mod binding;
pub use binding::{Binding, NewBinding};

pub mod collaborators;
pub use collaborators::Collaborators;

mod config;
pub use config::PostOfficeConfig;

mod control_plane;
pub use control_plane::recovery::RecoveryReport;
pub use control_plane::send_lock::SendLock;

mod data_plane;

mod dedupe;
pub use dedupe::duplicate_id_cache::DuplicateIdCache;

mod error;
pub use error::PostOfficeError;

mod message;
pub use message::{
    DuplicateId, Filter, MessageReference, ServerMessage, TransactionId,
    MESSAGE_BASE_MEMORY_ESTIMATE, REFERENCE_MEMORY_ESTIMATE,
};

#[doc(hidden)]
pub mod observability;

mod post_office;
pub use post_office::PostOffice;

mod routing;
pub use routing::address_manager::{AddressManager, BindingSet};
pub use routing::simple_address_manager::SimpleAddressManager;
pub use routing::wildcard::WildcardConfiguration;
pub use routing::wildcard_address_manager::WildcardAddressManager;

mod runtime;

#[cfg(test)]
mod test_support;
