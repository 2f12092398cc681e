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

use post_office::collaborators::{
    ManagementService, Queue, QueueSettings, QueueSettingsRepository, ResourceManager,
};
use post_office::{Address, PostOfficeError, TransactionId};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Keeps the currently registered addresses and queues.
#[derive(Default)]
pub struct RecordingManagement {
    addresses: Mutex<BTreeSet<Address>>,
    queues: Mutex<BTreeSet<String>>,
}

impl RecordingManagement {
    pub fn addresses(&self) -> Vec<Address> {
        self.addresses.lock().unwrap().iter().cloned().collect()
    }

    pub fn queues(&self) -> Vec<String> {
        self.queues.lock().unwrap().iter().cloned().collect()
    }
}

impl ManagementService for RecordingManagement {
    fn register_address(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.addresses.lock().unwrap().insert(address.clone());
        Ok(())
    }

    fn unregister_address(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.addresses.lock().unwrap().remove(address);
        Ok(())
    }

    fn register_queue(
        &self,
        queue: &Arc<dyn Queue>,
        _address: &Address,
    ) -> Result<(), PostOfficeError> {
        self.queues.lock().unwrap().insert(queue.name().to_string());
        Ok(())
    }

    fn unregister_queue(
        &self,
        queue_name: &str,
        _address: &Address,
    ) -> Result<(), PostOfficeError> {
        self.queues.lock().unwrap().remove(queue_name);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingResourceManager {
    recovered: Mutex<Vec<TransactionId>>,
}

impl RecordingResourceManager {
    pub fn recovered_transactions(&self) -> Vec<TransactionId> {
        self.recovered.lock().unwrap().clone()
    }
}

impl ResourceManager for RecordingResourceManager {
    fn put_recovered_transaction(&self, transaction_id: TransactionId) {
        self.recovered.lock().unwrap().push(transaction_id);
    }
}

/// Same settings for every queue.
#[derive(Default)]
pub struct StaticQueueSettings {
    pub settings: QueueSettings,
}

impl QueueSettingsRepository for StaticQueueSettings {
    fn match_settings(&self, _queue_name: &str) -> QueueSettings {
        self.settings.clone()
    }
}
