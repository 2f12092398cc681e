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

use async_trait::async_trait;
use post_office::collaborators::{
    DuplicateIdMap, LoadedBindings, Queue, QueueFactory, ResourceManager, StorageManager,
};
use post_office::{
    Address, Binding, MessageReference, PostOfficeError, ServerMessage, TransactionId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A binding as the storage layer keeps it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistedBinding {
    pub address: Address,
    pub queue_name: String,
    pub persistence_id: u64,
    pub temporary: bool,
    pub fanout: bool,
}

/// Record of one scheduled-delivery-time update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledUpdate {
    pub transaction_id: Option<TransactionId>,
    pub queue_name: String,
    pub message_id: u64,
    pub scheduled_time: Option<u64>,
}

#[derive(Default)]
struct StorageState {
    bindings: BTreeMap<String, PersistedBinding>,
    destinations: BTreeSet<Address>,
    duplicate_ids: BTreeMap<u64, (Address, Vec<u8>)>,
    journal: Vec<(u64, ServerMessage)>,
    prepared_transactions: Vec<TransactionId>,
    scheduled: Vec<ScheduledUpdate>,
}

/// Storage kept in memory; survives "restarts" by sharing the instance.
#[derive(Default)]
pub struct InMemoryStorage {
    next_id: AtomicU64,
    fail_writes: AtomicBool,
    fail_journal: AtomicBool,
    state: Mutex<StorageState>,
}

impl InMemoryStorage {
    /// Makes every later write fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes journal replay fail before it touches any queue.
    pub fn fail_journal_replay(&self, fail: bool) {
        self.fail_journal.store(fail, Ordering::SeqCst);
    }

    pub fn persisted_bindings(&self) -> Vec<PersistedBinding> {
        self.state.lock().unwrap().bindings.values().cloned().collect()
    }

    pub fn persisted_destinations(&self) -> Vec<Address> {
        self.state
            .lock()
            .unwrap()
            .destinations
            .iter()
            .cloned()
            .collect()
    }

    /// Stored duplicate ids for `address`, oldest first.
    pub fn duplicate_ids(&self, address: &Address) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .duplicate_ids
            .values()
            .filter(|(stored, _)| stored == address)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn scheduled_updates(&self) -> Vec<ScheduledUpdate> {
        self.state.lock().unwrap().scheduled.clone()
    }

    /// Adds a journaled message that replay re-attaches to the queue with
    /// `persistence_id`.
    pub fn journal_message(&self, persistence_id: u64, message: ServerMessage) {
        self.state
            .lock()
            .unwrap()
            .journal
            .push((persistence_id, message));
    }

    /// Adds a prepared transaction that replay hands to the resource manager.
    pub fn prepare_transaction(&self, transaction_id: TransactionId) {
        self.state
            .lock()
            .unwrap()
            .prepared_transactions
            .push(transaction_id);
    }

    fn check_writable(&self) -> Result<(), PostOfficeError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PostOfficeError::Storage("write refused".to_string()));
        }
        Ok(())
    }

    fn record_schedule(&self, transaction_id: Option<TransactionId>, reference: &MessageReference) {
        self.state.lock().unwrap().scheduled.push(ScheduledUpdate {
            transaction_id,
            queue_name: reference.queue().name().to_string(),
            message_id: reference.message().message_id(),
            scheduled_time: reference.scheduled_delivery_time(),
        });
    }
}

#[async_trait]
impl StorageManager for InMemoryStorage {
    async fn load_bindings(
        &self,
        queue_factory: &dyn QueueFactory,
    ) -> Result<LoadedBindings, PostOfficeError> {
        let state = self.state.lock().unwrap();
        let bindings = state
            .bindings
            .values()
            .map(|persisted| {
                let queue = queue_factory.create_queue(
                    Some(persisted.persistence_id),
                    &persisted.queue_name,
                    None,
                    true,
                    persisted.temporary,
                );
                Binding::new(persisted.address.clone(), queue, persisted.fanout)
                    .with_temporary(persisted.temporary)
            })
            .collect();

        Ok(LoadedBindings {
            bindings,
            destinations: state.destinations.iter().cloned().collect(),
        })
    }

    async fn add_binding(&self, binding: &Binding) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.state.lock().unwrap().bindings.insert(
            binding.queue_name().to_string(),
            PersistedBinding {
                address: binding.address().clone(),
                queue_name: binding.queue_name().to_string(),
                persistence_id: binding.queue().persistence_id(),
                temporary: binding.is_temporary(),
                fanout: binding.is_fanout(),
            },
        );
        Ok(())
    }

    async fn delete_binding(&self, binding: &Binding) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.state
            .lock()
            .unwrap()
            .bindings
            .remove(binding.queue_name());
        Ok(())
    }

    async fn add_destination(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.state
            .lock()
            .unwrap()
            .destinations
            .insert(address.clone());
        Ok(())
    }

    async fn delete_destination(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.state.lock().unwrap().destinations.remove(address);
        Ok(())
    }

    async fn load_message_journal(
        &self,
        queues: &HashMap<u64, Arc<dyn Queue>>,
        resource_manager: &dyn ResourceManager,
    ) -> Result<DuplicateIdMap, PostOfficeError> {
        if self.fail_journal.load(Ordering::SeqCst) {
            return Err(PostOfficeError::Storage("journal unreadable".to_string()));
        }
        let state = self.state.lock().unwrap();

        for transaction_id in &state.prepared_transactions {
            resource_manager.put_recovered_transaction(*transaction_id);
        }

        let mut reattached = 0;
        for (persistence_id, message) in &state.journal {
            if let Some(queue) = queues.get(persistence_id) {
                queue.add_last(MessageReference::new(
                    Arc::new(message.clone()),
                    queue.clone(),
                ));
                reattached += 1;
            }
        }

        let mut duplicates = DuplicateIdMap::new();
        for (record_id, (address, id)) in &state.duplicate_ids {
            duplicates
                .entry(address.clone())
                .or_default()
                .push((id.clone(), *record_id));
        }

        debug!(
            reattached,
            addresses = duplicates.len(),
            "in-memory journal replayed"
        );
        Ok(duplicates)
    }

    async fn update_scheduled_delivery_time(
        &self,
        reference: &MessageReference,
    ) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.record_schedule(None, reference);
        Ok(())
    }

    async fn update_scheduled_delivery_time_transactional(
        &self,
        transaction_id: TransactionId,
        reference: &MessageReference,
    ) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.record_schedule(Some(transaction_id), reference);
        Ok(())
    }

    fn generate_unique_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn store_duplicate_id(
        &self,
        address: &Address,
        duplicate_id: &[u8],
        record_id: u64,
    ) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.state
            .lock()
            .unwrap()
            .duplicate_ids
            .insert(record_id, (address.clone(), duplicate_id.to_vec()));
        Ok(())
    }

    async fn delete_duplicate_id(&self, record_id: u64) -> Result<(), PostOfficeError> {
        self.check_writable()?;
        self.state.lock().unwrap().duplicate_ids.remove(&record_id);
        Ok(())
    }
}
