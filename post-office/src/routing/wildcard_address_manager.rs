//! Hierarchical address directory.
//!
//! Bindings registered under a wildcard address are folded into the binding
//! set of every concrete address the pattern matches. The folded sets are
//! recomputed on write and published in the same snapshot as the change that
//! caused them, so readers see a mutation and its fan-out together.

use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::address::Address;
use crate::binding::Binding;
use crate::error::PostOfficeError;
use crate::observability::events;
use crate::routing::address_manager::{AddressManager, AddressTable, BindingSet};
use crate::routing::wildcard::WildcardConfiguration;

const COMPONENT: &str = "wildcard_address_manager";

#[derive(Clone, Default)]
struct WildcardTable {
    registered: AddressTable,
    resolved: HashMap<Address, BindingSet>,
}

pub struct WildcardAddressManager {
    config: WildcardConfiguration,
    table: ArcSwap<WildcardTable>,
    writer: Mutex<()>,
}

impl WildcardAddressManager {
    pub fn new(config: WildcardConfiguration) -> Self {
        Self {
            config,
            table: ArcSwap::from_pointee(WildcardTable::default()),
            writer: Mutex::new(()),
        }
    }

    /// Applies a change to the registered table, then re-resolves every
    /// concrete address affected by a change to `touched`.
    fn update<R>(
        &self,
        touched: &Address,
        apply: impl FnOnce(&mut AddressTable) -> R,
    ) -> R {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = WildcardTable::clone(&self.table.load());
        let outcome = apply(&mut next.registered);
        self.resolve_affected(&mut next, touched);
        self.table.store(Arc::new(next));
        outcome
    }

    fn resolve_affected(&self, table: &mut WildcardTable, touched: &Address) {
        if !self.config.is_wildcard(touched) {
            self.resolve(table, touched);
            return;
        }

        let affected: Vec<Address> = self
            .concrete_addresses(&table.registered)
            .into_iter()
            .filter(|address| self.config.matches(touched, address))
            .collect();

        debug!(
            event = events::WILDCARD_FANOUT,
            component = COMPONENT,
            pattern = touched.as_str(),
            affected = affected.len(),
            "re-resolving addresses covered by wildcard"
        );

        for address in affected {
            self.resolve(table, &address);
        }
    }

    fn concrete_addresses(&self, registered: &AddressTable) -> HashSet<Address> {
        registered
            .destinations
            .iter()
            .chain(registered.mappings.keys())
            .filter(|address| !self.config.is_wildcard(address))
            .cloned()
            .collect()
    }

    fn resolve(&self, table: &mut WildcardTable, address: &Address) {
        let registered = &table.registered;
        let known =
            registered.destinations.contains(address) || registered.mappings.contains_key(address);

        let mut resolved: Vec<Arc<Binding>> = Vec::new();
        if known {
            if let Some(own) = registered.mappings.get(address) {
                resolved.extend(own.iter().cloned());
            }
            resolved.extend(self.wildcard_bindings(registered, address));
        }

        if resolved.is_empty() {
            table.resolved.remove(address);
        } else {
            table.resolved.insert(address.clone(), resolved.into());
        }
    }

    /// Bindings of every wildcard address matching `address`, in address order.
    fn wildcard_bindings<'t>(
        &'t self,
        registered: &'t AddressTable,
        address: &'t Address,
    ) -> impl Iterator<Item = Arc<Binding>> + 't {
        registered
            .mappings
            .iter()
            .filter(move |(pattern, _)| {
                self.config.is_wildcard(pattern) && self.config.matches(pattern, address)
            })
            .flat_map(|(_, set)| set.iter().cloned())
    }
}

impl AddressManager for WildcardAddressManager {
    fn add_destination(&self, address: &Address) -> bool {
        self.update(address, |table| table.destinations.insert(address.clone()))
    }

    fn remove_destination(&self, address: &Address) -> bool {
        self.update(address, |table| table.destinations.remove(address))
    }

    fn contains_destination(&self, address: &Address) -> bool {
        self.table.load().registered.destinations.contains(address)
    }

    fn destinations(&self) -> HashSet<Address> {
        self.table.load().registered.destinations.clone()
    }

    fn add_binding(&self, binding: Arc<Binding>) -> Result<(), PostOfficeError> {
        let address = binding.address().clone();
        self.update(&address, |table| table.add_binding(binding))
    }

    fn remove_binding(&self, queue_name: &str) -> Option<Arc<Binding>> {
        let address = self.binding(queue_name)?.address().clone();
        self.update(&address, |table| table.bindings.remove(queue_name))
    }

    fn add_mapping(&self, address: &Address, binding: Arc<Binding>) -> bool {
        self.update(address, |table| table.add_mapping(address, binding))
    }

    fn remove_mapping(&self, address: &Address, queue_name: &str) -> bool {
        self.update(address, |table| table.remove_mapping(address, queue_name))
    }

    fn register_binding(&self, binding: Arc<Binding>) -> Result<bool, PostOfficeError> {
        let address = binding.address().clone();
        self.update(&address, |table| table.register_binding(binding))
    }

    fn unregister_binding(
        &self,
        queue_name: &str,
    ) -> Result<(Arc<Binding>, bool), PostOfficeError> {
        let address = self
            .binding(queue_name)
            .ok_or_else(|| PostOfficeError::BindingNotFound(queue_name.to_string()))?
            .address()
            .clone();
        self.update(&address, |table| table.unregister_binding(queue_name))
    }

    fn bindings_for(&self, address: &Address) -> Option<BindingSet> {
        let table = self.table.load();
        if let Some(resolved) = table.resolved.get(address) {
            return Some(resolved.clone());
        }

        // Addresses never declared still reach the wildcards that cover them.
        let matched: Vec<Arc<Binding>> = self
            .wildcard_bindings(&table.registered, address)
            .collect();
        (!matched.is_empty()).then(|| matched.into())
    }

    fn binding(&self, queue_name: &str) -> Option<Arc<Binding>> {
        self.table.load().registered.bindings.get(queue_name).cloned()
    }

    fn bindings(&self) -> HashMap<String, Arc<Binding>> {
        self.table.load().registered.bindings.clone()
    }

    fn mappings(&self) -> HashMap<Address, BindingSet> {
        self.table
            .load()
            .registered
            .mappings
            .iter()
            .map(|(address, set)| (address.clone(), set.clone()))
            .collect()
    }

    fn clear(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.table.store(Arc::new(WildcardTable::default()));
    }
}
