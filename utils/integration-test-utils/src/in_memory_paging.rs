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
use post_office::collaborators::{PagingManager, PagingStore};
use post_office::{Address, PostOfficeError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Per-address store admitting batches until its byte budget is spent.
pub struct BudgetPagingStore {
    budget: usize,
    charged: AtomicUsize,
    rejected: AtomicUsize,
}

impl BudgetPagingStore {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            charged: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
        }
    }

    pub fn charged(&self) -> usize {
        self.charged.load(Ordering::SeqCst)
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PagingStore for BudgetPagingStore {
    async fn add_size(&self, size: usize) -> Result<bool, PostOfficeError> {
        let admitted = self
            .charged
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |charged| {
                charged
                    .checked_add(size)
                    .filter(|total| *total <= self.budget)
            })
            .is_ok();
        if !admitted {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
        Ok(admitted)
    }
}

/// Paging manager whose stores share one per-address byte budget.
pub struct InMemoryPagingManager {
    budget: usize,
    stores: Mutex<HashMap<Address, Arc<BudgetPagingStore>>>,
    started: AtomicBool,
    depage_started: AtomicBool,
}

impl Default for InMemoryPagingManager {
    fn default() -> Self {
        Self::with_budget(usize::MAX)
    }
}

impl InMemoryPagingManager {
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget,
            stores: Mutex::new(HashMap::new()),
            started: AtomicBool::new(false),
            depage_started: AtomicBool::new(false),
        }
    }

    pub fn store(&self, address: &Address) -> Option<Arc<BudgetPagingStore>> {
        self.stores.lock().unwrap().get(address).cloned()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn depage_started(&self) -> bool {
        self.depage_started.load(Ordering::SeqCst)
    }

    fn get_or_create(&self, address: &Address) -> Arc<BudgetPagingStore> {
        self.stores
            .lock()
            .unwrap()
            .entry(address.clone())
            .or_insert_with(|| Arc::new(BudgetPagingStore::new(self.budget)))
            .clone()
    }
}

#[async_trait]
impl PagingManager for InMemoryPagingManager {
    async fn start(&self) -> Result<(), PostOfficeError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PostOfficeError> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn create_page_store(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.get_or_create(address);
        Ok(())
    }

    async fn page_store(
        &self,
        address: &Address,
    ) -> Result<Arc<dyn PagingStore>, PostOfficeError> {
        Ok(self.get_or_create(address))
    }

    fn has_page_store(&self, address: &Address) -> bool {
        self.stores.lock().unwrap().contains_key(address)
    }

    async fn start_global_depage(&self) -> Result<(), PostOfficeError> {
        self.depage_started.store(true, Ordering::SeqCst);
        Ok(())
    }
}
