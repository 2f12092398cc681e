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
    Queue, QueueFactory, QueueSettingsRepository, Router, StorageManager,
};
use post_office::{Filter, MessageReference, PostOfficeError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Queue that records every appended reference.
pub struct RecordingQueue {
    name: String,
    persistence_id: u64,
    durable: bool,
    backup: AtomicBool,
    activates_immediately: bool,
    fail_expiry: bool,
    expire_everything: bool,
    references: Mutex<Vec<MessageReference>>,
    expiry_runs: AtomicUsize,
}

impl RecordingQueue {
    pub fn new(name: &str, persistence_id: u64, durable: bool) -> Self {
        Self {
            name: name.to_string(),
            persistence_id,
            durable,
            backup: AtomicBool::new(false),
            activates_immediately: true,
            fail_expiry: false,
            expire_everything: false,
            references: Mutex::new(Vec::new()),
            expiry_runs: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.references.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Message ids in append order.
    pub fn message_ids(&self) -> Vec<u64> {
        self.references
            .lock()
            .unwrap()
            .iter()
            .map(|reference| reference.message().message_id())
            .collect()
    }

    pub fn expiry_runs(&self) -> usize {
        self.expiry_runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Queue for RecordingQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn persistence_id(&self) -> u64 {
        self.persistence_id
    }

    fn is_durable(&self) -> bool {
        self.durable
    }

    fn is_backup(&self) -> bool {
        self.backup.load(Ordering::SeqCst)
    }

    fn set_backup(&self) {
        self.backup.store(true, Ordering::SeqCst);
    }

    fn activate(&self) -> bool {
        if self.activates_immediately {
            self.backup.store(false, Ordering::SeqCst);
        }
        self.activates_immediately
    }

    fn add_last(&self, reference: MessageReference) {
        self.references.lock().unwrap().push(reference);
    }

    async fn expire_messages(
        &self,
        _storage: &dyn StorageManager,
        router: &dyn Router,
        settings: &dyn QueueSettingsRepository,
    ) -> Result<(), PostOfficeError> {
        self.expiry_runs.fetch_add(1, Ordering::SeqCst);
        if self.fail_expiry {
            return Err(PostOfficeError::Expiry {
                queue: self.name.clone(),
                reason: "expiry failure requested by test".to_string(),
            });
        }
        if !self.expire_everything {
            return Ok(());
        }

        let expired = std::mem::take(&mut *self.references.lock().unwrap());
        let Some(expiry_address) = settings.match_settings(&self.name).expiry_address else {
            return Ok(());
        };
        for reference in expired {
            let message = reference
                .message()
                .as_ref()
                .clone()
                .with_address(expiry_address.clone());
            router.route_and_deliver(Arc::new(message)).await?;
        }
        Ok(())
    }
}

/// Builds [`RecordingQueue`]s and keeps every queue it built, by name.
#[derive(Default)]
pub struct RecordingQueueFactory {
    next_persistence_id: AtomicU64,
    queues: Mutex<HashMap<String, Arc<RecordingQueue>>>,
    failing_expiry: Mutex<HashSet<String>>,
    expiring: Mutex<HashSet<String>>,
    pending_activation: Mutex<HashSet<String>>,
}

impl RecordingQueueFactory {
    /// Queues later created under `name` fail every expiry run.
    pub fn fail_expiry_for(&self, name: &str) {
        self.failing_expiry.lock().unwrap().insert(name.to_string());
    }

    /// Queues later created under `name` treat every entry as overdue.
    pub fn expire_everything_for(&self, name: &str) {
        self.expiring.lock().unwrap().insert(name.to_string());
    }

    /// Queues later created under `name` report pending activation.
    pub fn delay_activation_for(&self, name: &str) {
        self.pending_activation
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn queue(&self, name: &str) -> Option<Arc<RecordingQueue>> {
        self.queues.lock().unwrap().get(name).cloned()
    }
}

impl QueueFactory for RecordingQueueFactory {
    fn create_queue(
        &self,
        persistence_id: Option<u64>,
        name: &str,
        _filter: Option<Arc<dyn Filter>>,
        durable: bool,
        _temporary: bool,
    ) -> Arc<dyn Queue> {
        let persistence_id = persistence_id
            .unwrap_or_else(|| self.next_persistence_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut queue = RecordingQueue::new(name, persistence_id, durable);
        queue.fail_expiry = self.failing_expiry.lock().unwrap().contains(name);
        queue.expire_everything = self.expiring.lock().unwrap().contains(name);
        queue.activates_immediately = !self.pending_activation.lock().unwrap().contains(name);

        let queue = Arc::new(queue);
        self.queues
            .lock()
            .unwrap()
            .insert(name.to_string(), queue.clone());
        queue
    }
}
