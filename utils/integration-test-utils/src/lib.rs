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


//! In-memory collaborators for exercising `post-office` end to end.

mod in_memory_broker;
pub use in_memory_broker::InMemoryBroker;
mod in_memory_paging;
pub use in_memory_paging::{BudgetPagingStore, InMemoryPagingManager};
mod in_memory_storage;
pub use in_memory_storage::{InMemoryStorage, PersistedBinding, ScheduledUpdate};
mod recording_management;
pub use recording_management::{
    RecordingManagement, RecordingResourceManager, StaticQueueSettings,
};
mod recording_queue;
pub use recording_queue::{RecordingQueue, RecordingQueueFactory};

/// Installs a test-friendly `tracing` subscriber once per process.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
