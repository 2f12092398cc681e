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

//! Contracts of the subsystems the post office drives but does not own.
//!
//! Persistence, paging accounting, queue storage, management and transaction
//! recovery are all supplied by the embedding broker through these traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::address::Address;
use crate::binding::Binding;
use crate::error::PostOfficeError;
use crate::message::{DuplicateId, Filter, MessageReference, ServerMessage, TransactionId};

/// Duplicate identifiers recovered from the journal, with their storage record ids.
pub type DuplicateIdMap = HashMap<Address, Vec<(DuplicateId, u64)>>;

/// Bindings and destinations read back from durable storage.
#[derive(Default)]
pub struct LoadedBindings {
    pub bindings: Vec<Binding>,
    pub destinations: Vec<Address>,
}

/// Consumer-facing message destination.
#[async_trait]
pub trait Queue: Send + Sync {
    fn name(&self) -> &str;

    /// Identifier the journal uses to re-attach recovered messages.
    fn persistence_id(&self) -> u64;

    fn is_durable(&self) -> bool;

    fn is_backup(&self) -> bool;

    /// Marks the queue as a passive replica awaiting activation.
    fn set_backup(&self);

    /// Promotes a backup queue.
    ///
    /// Returns `true` when the queue is active on return, `false` when it is
    /// still waiting for its consumers to fail over and needs catch-up handling.
    fn activate(&self) -> bool;

    /// Appends a reference to the tail of the queue.
    fn add_last(&self, reference: MessageReference);

    /// Purges this queue's own overdue entries. Entries whose settings name
    /// an expiry address are sent there through `router`.
    async fn expire_messages(
        &self,
        storage: &dyn StorageManager,
        router: &dyn Router,
        settings: &dyn QueueSettingsRepository,
    ) -> Result<(), PostOfficeError>;
}

/// Routing entry point handed to queues that send messages on themselves.
#[async_trait]
pub trait Router: Send + Sync {
    /// Routes `message` and delivers what it produced. Returns the number of
    /// references delivered.
    async fn route_and_deliver(&self, message: Arc<ServerMessage>)
        -> Result<usize, PostOfficeError>;
}

pub trait QueueFactory: Send + Sync {
    /// Builds a queue; `persistence_id` is `None` for queues not yet stored.
    fn create_queue(
        &self,
        persistence_id: Option<u64>,
        name: &str,
        filter: Option<Arc<dyn Filter>>,
        durable: bool,
        temporary: bool,
    ) -> Arc<dyn Queue>;
}

/// Durable storage for bindings, destinations and the message journal.
#[async_trait]
pub trait StorageManager: Send + Sync {
    async fn load_bindings(
        &self,
        queue_factory: &dyn QueueFactory,
    ) -> Result<LoadedBindings, PostOfficeError>;

    async fn add_binding(&self, binding: &Binding) -> Result<(), PostOfficeError>;

    async fn delete_binding(&self, binding: &Binding) -> Result<(), PostOfficeError>;

    async fn add_destination(&self, address: &Address) -> Result<(), PostOfficeError>;

    async fn delete_destination(&self, address: &Address) -> Result<(), PostOfficeError>;

    /// Replays the journal onto `queues` (keyed by persistence id) and returns
    /// the duplicate identifiers seen per address.
    async fn load_message_journal(
        &self,
        queues: &HashMap<u64, Arc<dyn Queue>>,
        resource_manager: &dyn ResourceManager,
    ) -> Result<DuplicateIdMap, PostOfficeError>;

    async fn update_scheduled_delivery_time(
        &self,
        reference: &MessageReference,
    ) -> Result<(), PostOfficeError>;

    async fn update_scheduled_delivery_time_transactional(
        &self,
        transaction_id: TransactionId,
        reference: &MessageReference,
    ) -> Result<(), PostOfficeError>;

    fn generate_unique_id(&self) -> u64;

    async fn store_duplicate_id(
        &self,
        address: &Address,
        duplicate_id: &[u8],
        record_id: u64,
    ) -> Result<(), PostOfficeError>;

    async fn delete_duplicate_id(&self, record_id: u64) -> Result<(), PostOfficeError>;
}

/// Per-address memory accounting gate.
#[async_trait]
pub trait PagingStore: Send + Sync {
    /// Charges `size` bytes; `false` means the batch was not admitted.
    async fn add_size(&self, size: usize) -> Result<bool, PostOfficeError>;
}

#[async_trait]
pub trait PagingManager: Send + Sync {
    async fn start(&self) -> Result<(), PostOfficeError>;

    async fn stop(&self) -> Result<(), PostOfficeError>;

    /// Creates the store for `address`; a no-op when it already exists.
    async fn create_page_store(&self, address: &Address) -> Result<(), PostOfficeError>;

    async fn page_store(&self, address: &Address) -> Result<Arc<dyn PagingStore>, PostOfficeError>;

    fn has_page_store(&self, address: &Address) -> bool;

    /// Resumes depaging interrupted by a previous shutdown.
    async fn start_global_depage(&self) -> Result<(), PostOfficeError>;
}

pub trait ManagementService: Send + Sync {
    fn register_address(&self, address: &Address) -> Result<(), PostOfficeError>;

    fn unregister_address(&self, address: &Address) -> Result<(), PostOfficeError>;

    fn register_queue(
        &self,
        queue: &Arc<dyn Queue>,
        address: &Address,
    ) -> Result<(), PostOfficeError>;

    fn unregister_queue(&self, queue_name: &str, address: &Address)
        -> Result<(), PostOfficeError>;
}

/// Transaction recovery context handed to journal replay.
pub trait ResourceManager: Send + Sync {
    fn put_recovered_transaction(&self, transaction_id: TransactionId);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueSettings {
    pub expiry_address: Option<Address>,
    pub max_delivery_attempts: u32,
}

pub trait QueueSettingsRepository: Send + Sync {
    fn match_settings(&self, queue_name: &str) -> QueueSettings;
}

/// Every collaborator the post office is wired to, shared by reference count.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn StorageManager>,
    pub paging: Arc<dyn PagingManager>,
    pub queue_factory: Arc<dyn QueueFactory>,
    pub management: Arc<dyn ManagementService>,
    pub resource_manager: Arc<dyn ResourceManager>,
    pub queue_settings: Arc<dyn QueueSettingsRepository>,
}
