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

//! The `PostOffice` facade.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::address::Address;
use crate::binding::{Binding, NewBinding};
use crate::collaborators::{Collaborators, Queue};
use crate::config::PostOfficeConfig;
use crate::control_plane::activation::ActivationController;
use crate::control_plane::binding_lifecycle::BindingLifecycle;
use crate::control_plane::recovery::{RecoveryLoader, RecoveryReport};
use crate::control_plane::send_lock::{SendLock, SendLockTable};
use crate::data_plane::{delivery, scheduling};
use crate::dedupe::cache_table::DuplicateIdCacheTable;
use crate::dedupe::duplicate_id_cache::DuplicateIdCache;
use crate::error::PostOfficeError;
use crate::message::{MessageReference, ServerMessage, TransactionId};
use crate::observability::events;
use crate::routing::address_manager::{AddressManager, BindingSet};
use crate::routing::router::{DirectoryRouter, MessageRouter};
use crate::routing::simple_address_manager::SimpleAddressManager;
use crate::routing::wildcard_address_manager::WildcardAddressManager;
use crate::runtime::expiry_runtime::ExpiryScanner;

const COMPONENT: &str = "post_office";

/// Routes messages from addresses to the queues bound to them.
///
/// Routing, delivery and scheduling may run from any number of tasks at
/// once. Structural changes (destinations, bindings), activation and send lock
/// creation are serialized by one critical section covering the whole
/// directory, so a routing decision never observes a half-applied change and
/// activation never misses a binding added concurrently.
pub struct PostOffice {
    name: String,
    config: PostOfficeConfig,
    address_manager: Arc<dyn AddressManager>,
    collaborators: Collaborators,
    backup: AtomicBool,
    started: AtomicBool,
    structure: tokio::sync::Mutex<SendLockTable>,
    duplicate_caches: DuplicateIdCacheTable,
    expiry_scanner: Mutex<Option<ExpiryScanner>>,
}

impl PostOffice {
    /// Builds a stopped post office. The address-matching strategy is fixed
    /// here by `config.wildcard_routing_enabled`.
    pub fn new(
        name: &str,
        config: PostOfficeConfig,
        collaborators: Collaborators,
    ) -> Result<Self, PostOfficeError> {
        config.validate()?;

        let address_manager: Arc<dyn AddressManager> = if config.wildcard_routing_enabled {
            Arc::new(WildcardAddressManager::new(config.wildcard_configuration()))
        } else {
            Arc::new(SimpleAddressManager::new())
        };
        let duplicate_caches = DuplicateIdCacheTable::new(
            config.id_cache_size,
            config.persist_id_cache,
            collaborators.storage.clone(),
        );

        Ok(Self {
            name: name.to_string(),
            backup: AtomicBool::new(config.backup),
            started: AtomicBool::new(false),
            config,
            address_manager,
            collaborators,
            structure: tokio::sync::Mutex::new(SendLockTable::default()),
            duplicate_caches,
            expiry_scanner: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PostOfficeConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_backup(&self) -> bool {
        self.backup.load(Ordering::Acquire)
    }

    /// Starts flow control, recovers persisted state and starts the expiry
    /// scanner when its period is positive.
    ///
    /// Starting an already started post office is a no-op that returns an
    /// empty report.
    pub async fn start(&self) -> Result<RecoveryReport, PostOfficeError> {
        if self.is_started() {
            return Ok(RecoveryReport::default());
        }
        info!(
            event = events::POST_OFFICE_START,
            component = COMPONENT,
            name = self.name.as_str(),
            "starting post office"
        );

        match self.start_inner().await {
            Ok(report) => {
                self.started.store(true, Ordering::Release);
                info!(
                    event = events::POST_OFFICE_START_OK,
                    component = COMPONENT,
                    name = self.name.as_str(),
                    report = %report,
                    "post office started"
                );
                Ok(report)
            }
            Err(err) => {
                self.abandon_start().await;
                error!(
                    event = events::POST_OFFICE_START_FAILED,
                    component = COMPONENT,
                    name = self.name.as_str(),
                    err = %err,
                    "post office failed to start"
                );
                Err(err)
            }
        }
    }

    async fn start_inner(&self) -> Result<RecoveryReport, PostOfficeError> {
        self.collaborators.paging.start().await?;

        let report = {
            let mut send_locks = self.structure.lock().await;
            let lifecycle = BindingLifecycle::new(
                self.address_manager.as_ref(),
                &self.collaborators,
                &mut send_locks,
                &self.backup,
            );
            RecoveryLoader::new(
                lifecycle,
                &self.collaborators,
                &self.duplicate_caches,
                self.config.persist_id_cache,
            )
            .run()
            .await?
        };

        if let Some(period) = self.config.message_expiry_scan_period() {
            let router = DirectoryRouter::new(
                self.address_manager.clone(),
                self.collaborators.paging.clone(),
                self.config.check_allowable_addresses,
            );
            let scanner = ExpiryScanner::spawn(
                period,
                self.address_manager.clone(),
                Arc::new(router),
                self.collaborators.clone(),
            )?;
            *self.lock_scanner() = Some(scanner);
        }
        Ok(report)
    }

    /// Undoes a partial start so that a later `start` recovers from scratch.
    async fn abandon_start(&self) {
        if let Err(err) = self.collaborators.paging.stop().await {
            warn!(
                event = events::POST_OFFICE_START_FAILED,
                component = COMPONENT,
                name = self.name.as_str(),
                err = %err,
                "failed to stop paging after failed start"
            );
        }
        let _structure = self.structure.lock().await;
        self.address_manager.clear();
    }

    /// Stops the expiry scanner and flow control, clears the directory and
    /// closes every send lock. In-flight routing is not drained.
    pub async fn stop(&self) -> Result<(), PostOfficeError> {
        if !self.started.swap(false, Ordering::AcqRel) {
            return Err(PostOfficeError::NotStarted);
        }

        let scanner = self.lock_scanner().take();
        if let Some(scanner) = scanner {
            scanner.stop().await;
        }

        let paging_stopped = self.collaborators.paging.stop().await;
        self.address_manager.clear();
        self.structure.lock().await.close_all();

        info!(
            event = events::POST_OFFICE_STOP,
            component = COMPONENT,
            name = self.name.as_str(),
            "post office stopped"
        );
        paging_stopped
    }

    /// Returns `true` when the destination was newly added.
    pub async fn add_destination(
        &self,
        address: &Address,
        durable: bool,
    ) -> Result<bool, PostOfficeError> {
        let mut send_locks = self.structure.lock().await;
        self.lifecycle(&mut send_locks)
            .add_destination(address, durable)
            .await
    }

    /// Returns `true` when the destination existed. Any send lock held for
    /// the address is closed.
    pub async fn remove_destination(
        &self,
        address: &Address,
        durable: bool,
    ) -> Result<bool, PostOfficeError> {
        let mut send_locks = self.structure.lock().await;
        self.lifecycle(&mut send_locks)
            .remove_destination(address, durable)
            .await
    }

    pub fn contains_destination(&self, address: &Address) -> bool {
        self.address_manager.contains_destination(address)
    }

    pub fn list_all_destinations(&self) -> HashSet<Address> {
        self.address_manager.destinations()
    }

    /// Creates the queue through the queue factory and binds it. The queue
    /// starts as a backup while this post office is one.
    pub async fn add_binding(&self, request: NewBinding) -> Result<Arc<Binding>, PostOfficeError> {
        let mut send_locks = self.structure.lock().await;
        self.lifecycle(&mut send_locks).add_binding(request).await
    }

    pub async fn remove_binding(&self, queue_name: &str) -> Result<Arc<Binding>, PostOfficeError> {
        let mut send_locks = self.structure.lock().await;
        self.lifecycle(&mut send_locks)
            .remove_binding(queue_name)
            .await
    }

    /// Bindings that receive messages sent to `address`; empty when none.
    pub fn bindings_for_address(&self, address: &Address) -> Vec<Arc<Binding>> {
        self.address_manager
            .bindings_for(address)
            .map(|set| set.to_vec())
            .unwrap_or_default()
    }

    pub fn binding(&self, queue_name: &str) -> Option<Arc<Binding>> {
        self.address_manager.binding(queue_name)
    }

    pub fn mappings(&self) -> HashMap<Address, BindingSet> {
        self.address_manager.mappings()
    }

    /// Resolves `message` into the references to deliver.
    ///
    /// An empty result means no binding accepted the message or flow control
    /// refused it; neither is an error.
    pub async fn route(
        &self,
        message: &Arc<ServerMessage>,
    ) -> Result<Vec<MessageReference>, PostOfficeError> {
        MessageRouter::new(
            self.address_manager.as_ref(),
            self.collaborators.paging.as_ref(),
            self.config.check_allowable_addresses,
        )
        .route(message)
        .await
    }

    pub fn deliver(&self, references: Vec<MessageReference>) {
        delivery::deliver(references);
    }

    pub async fn schedule_references(
        &self,
        scheduled_time: u64,
        references: &[MessageReference],
    ) -> Result<(), PostOfficeError> {
        scheduling::schedule_references(
            self.collaborators.storage.as_ref(),
            None,
            scheduled_time,
            references,
        )
        .await
    }

    pub async fn schedule_references_in_transaction(
        &self,
        transaction_id: TransactionId,
        scheduled_time: u64,
        references: &[MessageReference],
    ) -> Result<(), PostOfficeError> {
        scheduling::schedule_references(
            self.collaborators.storage.as_ref(),
            Some(transaction_id),
            scheduled_time,
            references,
        )
        .await
    }

    /// Promotes this post office from backup and activates every queue.
    /// Returns the queues that still need catch-up handling.
    pub async fn activate(&self) -> Vec<Arc<dyn Queue>> {
        let _structure = self.structure.lock().await;
        info!(
            event = events::ACTIVATION_START,
            component = COMPONENT,
            name = self.name.as_str(),
            "activating post office"
        );
        ActivationController::new(self.address_manager.as_ref(), &self.backup).activate()
    }

    /// The single send lock for `address`, created on first use.
    pub async fn send_lock(&self, address: &Address) -> Arc<SendLock> {
        let mut send_locks = self.structure.lock().await;
        let existing = send_locks.len();
        let lock = send_locks.get_or_create(address);
        if send_locks.len() > existing {
            debug!(
                event = events::SEND_LOCK_CREATE,
                component = COMPONENT,
                address = address.as_str(),
                "send lock created"
            );
        }
        lock
    }

    /// The single duplicate id cache for `address`, created on first use.
    pub fn duplicate_id_cache(&self, address: &Address) -> Arc<DuplicateIdCache> {
        self.duplicate_caches.get_or_create(address)
    }

    fn lifecycle<'a>(&'a self, send_locks: &'a mut SendLockTable) -> BindingLifecycle<'a> {
        BindingLifecycle::new(
            self.address_manager.as_ref(),
            &self.collaborators,
            send_locks,
            &self.backup,
        )
    }

    fn lock_scanner(&self) -> std::sync::MutexGuard<'_, Option<ExpiryScanner>> {
        self.expiry_scanner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
