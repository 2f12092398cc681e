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

//! Bounded per-address record of recently seen duplicate identifiers.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::address::Address;
use crate::collaborators::StorageManager;
use crate::error::PostOfficeError;
use crate::message::DuplicateId;
use crate::observability::events;

const COMPONENT: &str = "duplicate_id_cache";

#[derive(Default)]
struct CacheEntries {
    record_ids: HashMap<DuplicateId, u64>,
    order: VecDeque<DuplicateId>,
}

impl CacheEntries {
    /// Inserts `id` and returns the record id of the entry evicted to make room.
    fn insert(&mut self, id: DuplicateId, record_id: u64, capacity: usize) -> Option<u64> {
        self.record_ids.insert(id.clone(), record_id);
        self.order.push_back(id);

        if self.order.len() <= capacity {
            return None;
        }
        let oldest = self.order.pop_front()?;
        self.record_ids.remove(&oldest)
    }
}

/// Rejects re-delivery of identifiers already seen on one address.
///
/// Holds at most `capacity` identifiers; the oldest is evicted first. When
/// persistence is on every entry is mirrored to storage under its own record id.
pub struct DuplicateIdCache {
    address: Address,
    capacity: usize,
    persist: bool,
    storage: Arc<dyn StorageManager>,
    entries: Mutex<CacheEntries>,
}

impl DuplicateIdCache {
    /// Construction has no side effects; the cache is inert until used.
    pub fn new(
        address: Address,
        capacity: usize,
        storage: Arc<dyn StorageManager>,
        persist: bool,
    ) -> Self {
        Self {
            address,
            capacity,
            persist,
            storage,
            entries: Mutex::new(CacheEntries::default()),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock_entries().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, duplicate_id: &[u8]) -> bool {
        self.lock_entries().record_ids.contains_key(duplicate_id)
    }

    /// Records `duplicate_id`; a no-op when it is already cached.
    pub async fn add_to_cache(&self, duplicate_id: DuplicateId) -> Result<(), PostOfficeError> {
        let record_id = if self.persist {
            self.storage.generate_unique_id()
        } else {
            0
        };

        let evicted = {
            let mut entries = self.lock_entries();
            if entries.record_ids.contains_key(&duplicate_id) {
                return Ok(());
            }
            entries.insert(duplicate_id.clone(), record_id, self.capacity)
        };

        if self.persist {
            self.storage
                .store_duplicate_id(&self.address, &duplicate_id, record_id)
                .await?;
            if let Some(evicted) = evicted {
                self.storage.delete_duplicate_id(evicted).await?;
            }
        }
        Ok(())
    }

    /// Seeds the cache from recovered entries, oldest first. Only the newest
    /// `capacity` entries are kept.
    pub fn load(&self, recovered: Vec<(DuplicateId, u64)>) {
        let skip = recovered.len().saturating_sub(self.capacity);
        let mut entries = self.lock_entries();
        for (duplicate_id, record_id) in recovered.into_iter().skip(skip) {
            if !entries.record_ids.contains_key(&duplicate_id) {
                entries.insert(duplicate_id, record_id, self.capacity);
            }
        }

        debug!(
            event = events::DUPLICATE_CACHE_LOADED,
            component = COMPONENT,
            address = self.address.as_str(),
            entries = entries.order.len(),
            "duplicate id cache loaded"
        );
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, CacheEntries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::DuplicateIdCache;
    use crate::address::Address;
    use crate::test_support::TestStorage;
    use std::sync::Arc;

    #[tokio::test]
    async fn evicts_oldest_past_capacity() {
        let storage = Arc::new(TestStorage::default());
        let cache = DuplicateIdCache::new(Address::from("orders"), 2, storage, false);

        cache.add_to_cache(b"a".to_vec()).await.unwrap();
        cache.add_to_cache(b"b".to_vec()).await.unwrap();
        cache.add_to_cache(b"c".to_vec()).await.unwrap();

        assert!(!cache.contains(b"a"));
        assert!(cache.contains(b"b"));
        assert!(cache.contains(b"c"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn persistent_cache_mirrors_inserts_and_evictions() {
        let storage = Arc::new(TestStorage::default());
        let cache = DuplicateIdCache::new(Address::from("orders"), 1, storage.clone(), true);

        cache.add_to_cache(b"a".to_vec()).await.unwrap();
        cache.add_to_cache(b"a".to_vec()).await.unwrap();
        cache.add_to_cache(b"b".to_vec()).await.unwrap();

        let stored = storage.stored_duplicates.lock().unwrap().clone();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].1, b"a".to_vec());
        assert_eq!(*storage.deleted_duplicates.lock().unwrap(), vec![stored[0].2]);
    }

    #[tokio::test]
    async fn volatile_cache_never_touches_storage() {
        let storage = Arc::new(TestStorage::default());
        let cache = DuplicateIdCache::new(Address::from("orders"), 4, storage.clone(), false);

        cache.add_to_cache(b"a".to_vec()).await.unwrap();

        assert!(storage.stored_duplicates.lock().unwrap().is_empty());
    }

    #[test]
    fn load_keeps_newest_entries() {
        let storage = Arc::new(TestStorage::default());
        let cache = DuplicateIdCache::new(Address::from("orders"), 2, storage, true);

        cache.load(vec![
            (b"a".to_vec(), 1),
            (b"b".to_vec(), 2),
            (b"c".to_vec(), 3),
        ]);

        assert!(!cache.contains(b"a"));
        assert!(cache.contains(b"b"));
        assert!(cache.contains(b"c"));
    }
}
