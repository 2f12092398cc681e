//! Lock-free get-or-create table of duplicate id caches.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::address::Address;
use crate::collaborators::StorageManager;
use crate::dedupe::duplicate_id_cache::DuplicateIdCache;
use crate::observability::events;

const COMPONENT: &str = "duplicate_id_cache_table";

type CacheMap = HashMap<Address, Arc<DuplicateIdCache>>;

pub(crate) struct DuplicateIdCacheTable {
    caches: ArcSwap<CacheMap>,
    capacity: usize,
    persist: bool,
    storage: Arc<dyn StorageManager>,
}

impl DuplicateIdCacheTable {
    pub(crate) fn new(capacity: usize, persist: bool, storage: Arc<dyn StorageManager>) -> Self {
        Self {
            caches: ArcSwap::from_pointee(CacheMap::new()),
            capacity,
            persist,
            storage,
        }
    }

    /// Returns the single cache for `address`, creating it on first use.
    ///
    /// Concurrent first callers may each build a candidate; exactly one is
    /// installed and every caller receives that one. Losing candidates are
    /// dropped without having been observed.
    pub(crate) fn get_or_create(&self, address: &Address) -> Arc<DuplicateIdCache> {
        if let Some(existing) = self.caches.load().get(address) {
            return existing.clone();
        }

        let candidate = Arc::new(DuplicateIdCache::new(
            address.clone(),
            self.capacity,
            self.storage.clone(),
            self.persist,
        ));
        let mut installed = candidate.clone();

        self.caches.rcu(|current| match current.get(address) {
            Some(existing) => {
                installed = existing.clone();
                Arc::clone(current)
            }
            None => {
                installed = candidate.clone();
                let mut next = CacheMap::clone(current);
                next.insert(address.clone(), candidate.clone());
                Arc::new(next)
            }
        });

        if Arc::ptr_eq(&installed, &candidate) {
            debug!(
                event = events::DUPLICATE_CACHE_CREATED,
                component = COMPONENT,
                address = address.as_str(),
                capacity = self.capacity,
                persist = self.persist,
                "duplicate id cache created"
            );
        }
        installed
    }

    #[cfg(test)]
    pub(crate) fn get(&self, address: &Address) -> Option<Arc<DuplicateIdCache>> {
        self.caches.load().get(address).cloned()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.caches.load().len()
    }
}
