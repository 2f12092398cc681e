//! Exact-match address directory: the address string is the lookup key.

use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::address::Address;
use crate::binding::Binding;
use crate::error::PostOfficeError;
use crate::routing::address_manager::{AddressManager, AddressTable, BindingSet};

/// Directory where each address resolves only to its own bindings.
#[derive(Default)]
pub struct SimpleAddressManager {
    table: ArcSwap<AddressTable>,
    writer: Mutex<()>,
}

impl SimpleAddressManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<R>(&self, apply: impl FnOnce(&mut AddressTable) -> R) -> R {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = AddressTable::clone(&self.table.load());
        let outcome = apply(&mut next);
        self.table.store(Arc::new(next));
        outcome
    }
}

impl AddressManager for SimpleAddressManager {
    fn add_destination(&self, address: &Address) -> bool {
        self.update(|table| table.destinations.insert(address.clone()))
    }

    fn remove_destination(&self, address: &Address) -> bool {
        self.update(|table| table.destinations.remove(address))
    }

    fn contains_destination(&self, address: &Address) -> bool {
        self.table.load().destinations.contains(address)
    }

    fn destinations(&self) -> HashSet<Address> {
        self.table.load().destinations.clone()
    }

    fn add_binding(&self, binding: Arc<Binding>) -> Result<(), PostOfficeError> {
        self.update(|table| table.add_binding(binding))
    }

    fn remove_binding(&self, queue_name: &str) -> Option<Arc<Binding>> {
        self.update(|table| table.bindings.remove(queue_name))
    }

    fn add_mapping(&self, address: &Address, binding: Arc<Binding>) -> bool {
        self.update(|table| table.add_mapping(address, binding))
    }

    fn remove_mapping(&self, address: &Address, queue_name: &str) -> bool {
        self.update(|table| table.remove_mapping(address, queue_name))
    }

    fn register_binding(&self, binding: Arc<Binding>) -> Result<bool, PostOfficeError> {
        self.update(|table| table.register_binding(binding))
    }

    fn unregister_binding(
        &self,
        queue_name: &str,
    ) -> Result<(Arc<Binding>, bool), PostOfficeError> {
        self.update(|table| table.unregister_binding(queue_name))
    }

    fn bindings_for(&self, address: &Address) -> Option<BindingSet> {
        self.table.load().mappings.get(address).cloned()
    }

    fn binding(&self, queue_name: &str) -> Option<Arc<Binding>> {
        self.table.load().bindings.get(queue_name).cloned()
    }

    fn bindings(&self) -> HashMap<String, Arc<Binding>> {
        self.table.load().bindings.clone()
    }

    fn mappings(&self) -> HashMap<Address, BindingSet> {
        self.table
            .load()
            .mappings
            .iter()
            .map(|(address, set)| (address.clone(), set.clone()))
            .collect()
    }

    fn clear(&self) {
        self.update(|table| *table = AddressTable::default());
    }
}
