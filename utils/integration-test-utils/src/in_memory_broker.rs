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

use post_office::Collaborators;
use std::sync::Arc;

use crate::{
    InMemoryPagingManager, InMemoryStorage, RecordingManagement, RecordingQueue,
    RecordingQueueFactory, RecordingResourceManager, StaticQueueSettings,
};

/// Every collaborator a post office needs, held in memory.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    pub storage: Arc<InMemoryStorage>,
    pub paging: Arc<InMemoryPagingManager>,
    pub queue_factory: Arc<RecordingQueueFactory>,
    pub management: Arc<RecordingManagement>,
    pub resource_manager: Arc<RecordingResourceManager>,
    pub queue_settings: Arc<StaticQueueSettings>,
}

impl InMemoryBroker {
    /// Stores admit at most `budget` bytes per address.
    pub fn with_paging_budget(budget: usize) -> Self {
        Self {
            paging: Arc::new(InMemoryPagingManager::with_budget(budget)),
            ..Default::default()
        }
    }

    /// A broker as it comes back after a restart: same storage, everything
    /// else fresh.
    pub fn restarted(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            ..Default::default()
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            storage: self.storage.clone(),
            paging: self.paging.clone(),
            queue_factory: self.queue_factory.clone(),
            management: self.management.clone(),
            resource_manager: self.resource_manager.clone(),
            queue_settings: self.queue_settings.clone(),
        }
    }

    pub fn queue(&self, name: &str) -> Option<Arc<RecordingQueue>> {
        self.queue_factory.queue(name)
    }
}
