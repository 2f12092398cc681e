//! Address directory capability and the snapshot table both strategies share.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::address::Address;
use crate::binding::Binding;
use crate::error::PostOfficeError;

/// Bindings registered under one address, in registration order.
pub type BindingSet = Arc<[Arc<Binding>]>;

/// Maps addresses to destinations and to the bindings registered under them.
///
/// Readers always observe a complete snapshot: never a torn binding set or a
/// binding without its mapping. Writers are expected to be rare.
pub trait AddressManager: Send + Sync {
    /// Returns `true` when the destination was newly added.
    fn add_destination(&self, address: &Address) -> bool;

    /// Returns `true` when the destination existed.
    fn remove_destination(&self, address: &Address) -> bool;

    fn contains_destination(&self, address: &Address) -> bool;

    fn destinations(&self) -> HashSet<Address>;

    /// Indexes a binding by queue name without touching the address mapping.
    fn add_binding(&self, binding: Arc<Binding>) -> Result<(), PostOfficeError>;

    fn remove_binding(&self, queue_name: &str) -> Option<Arc<Binding>>;

    /// Appends `binding` under `address`. Returns `true` when the address
    /// already had at least one mapping.
    fn add_mapping(&self, address: &Address, binding: Arc<Binding>) -> bool;

    /// Returns `true` when this removed the last mapping under `address`.
    fn remove_mapping(&self, address: &Address, queue_name: &str) -> bool;

    /// Adds the binding to the queue-name index and its address mapping as
    /// one atomic change. Returns whether the address was already mapped.
    fn register_binding(&self, binding: Arc<Binding>) -> Result<bool, PostOfficeError>;

    /// Removes the binding from both indexes as one atomic change. The flag
    /// reports whether its address lost its last mapping.
    fn unregister_binding(
        &self,
        queue_name: &str,
    ) -> Result<(Arc<Binding>, bool), PostOfficeError>;

    /// Bindings that receive messages sent to `address`.
    fn bindings_for(&self, address: &Address) -> Option<BindingSet>;

    fn binding(&self, queue_name: &str) -> Option<Arc<Binding>>;

    /// Every binding keyed by queue name.
    fn bindings(&self) -> HashMap<String, Arc<Binding>>;

    /// Every address with at least one mapping, as registered.
    fn mappings(&self) -> HashMap<Address, BindingSet>;

    fn clear(&self);
}

/// Immutable directory snapshot. Writers clone, modify and swap it.
#[derive(Clone, Default)]
pub(crate) struct AddressTable {
    pub(crate) destinations: HashSet<Address>,
    pub(crate) bindings: HashMap<String, Arc<Binding>>,
    pub(crate) mappings: BTreeMap<Address, BindingSet>,
}

impl AddressTable {
    pub(crate) fn add_binding(&mut self, binding: Arc<Binding>) -> Result<(), PostOfficeError> {
        let queue_name = binding.queue_name().to_string();
        if self.bindings.contains_key(&queue_name) {
            return Err(PostOfficeError::BindingAlreadyExists(queue_name));
        }
        self.bindings.insert(queue_name, binding);
        Ok(())
    }

    pub(crate) fn add_mapping(&mut self, address: &Address, binding: Arc<Binding>) -> bool {
        match self.mappings.get(address) {
            Some(existing) => {
                let mut next = existing.to_vec();
                next.push(binding);
                self.mappings.insert(address.clone(), next.into());
                true
            }
            None => {
                self.mappings.insert(address.clone(), vec![binding].into());
                false
            }
        }
    }

    pub(crate) fn remove_mapping(&mut self, address: &Address, queue_name: &str) -> bool {
        let Some(existing) = self.mappings.get(address) else {
            return false;
        };

        let remaining: Vec<Arc<Binding>> = existing
            .iter()
            .filter(|binding| binding.queue_name() != queue_name)
            .cloned()
            .collect();

        if remaining.is_empty() {
            self.mappings.remove(address);
            true
        } else {
            self.mappings.insert(address.clone(), remaining.into());
            false
        }
    }

    pub(crate) fn register_binding(
        &mut self,
        binding: Arc<Binding>,
    ) -> Result<bool, PostOfficeError> {
        self.add_binding(binding.clone())?;
        let address = binding.address().clone();
        Ok(self.add_mapping(&address, binding))
    }

    pub(crate) fn unregister_binding(
        &mut self,
        queue_name: &str,
    ) -> Result<(Arc<Binding>, bool), PostOfficeError> {
        let binding = self
            .bindings
            .remove(queue_name)
            .ok_or_else(|| PostOfficeError::BindingNotFound(queue_name.to_string()))?;
        let last = self.remove_mapping(binding.address(), queue_name);
        Ok((binding, last))
    }
}
