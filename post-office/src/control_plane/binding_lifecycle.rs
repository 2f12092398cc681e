//! Structural transitions of destinations and bindings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::address::Address;
use crate::binding::{Binding, NewBinding};
use crate::collaborators::Collaborators;
use crate::control_plane::send_lock::SendLockTable;
use crate::error::PostOfficeError;
use crate::observability::events;
use crate::routing::address_manager::AddressManager;

const COMPONENT: &str = "binding_lifecycle";

/// Applies one structural change across the directory, flow control,
/// storage and management.
///
/// Borrowing the send lock table mutably ties every lifecycle to the post
/// office's structural critical section: the table is only reachable through
/// its guard.
pub(crate) struct BindingLifecycle<'a> {
    address_manager: &'a dyn AddressManager,
    collaborators: &'a Collaborators,
    send_locks: &'a mut SendLockTable,
    backup: &'a AtomicBool,
}

impl<'a> BindingLifecycle<'a> {
    pub(crate) fn new(
        address_manager: &'a dyn AddressManager,
        collaborators: &'a Collaborators,
        send_locks: &'a mut SendLockTable,
        backup: &'a AtomicBool,
    ) -> Self {
        Self {
            address_manager,
            collaborators,
            send_locks,
            backup,
        }
    }

    pub(crate) fn address_manager(&self) -> &'a dyn AddressManager {
        self.address_manager
    }

    /// Returns `true` when the destination was newly added.
    pub(crate) async fn add_destination(
        &mut self,
        address: &Address,
        durable: bool,
    ) -> Result<bool, PostOfficeError> {
        self.collaborators.paging.create_page_store(address).await?;

        let was_mapped = self.is_mapped(address);
        if !self.address_manager.add_destination(address) {
            return Ok(false);
        }

        if durable {
            self.collaborators.storage.add_destination(address).await?;
        }
        if !was_mapped {
            self.collaborators.management.register_address(address)?;
        }

        info!(
            event = events::DESTINATION_ADD_OK,
            component = COMPONENT,
            address = address.as_str(),
            durable,
            "destination added"
        );
        Ok(true)
    }

    /// Returns `true` when the destination existed.
    pub(crate) async fn remove_destination(
        &mut self,
        address: &Address,
        durable: bool,
    ) -> Result<bool, PostOfficeError> {
        let removed = self.address_manager.remove_destination(address);
        self.send_locks.remove(address);

        if !removed {
            return Ok(false);
        }

        if durable {
            self.collaborators.storage.delete_destination(address).await?;
        }
        if !self.is_mapped(address) {
            self.collaborators.management.unregister_address(address)?;
        }

        info!(
            event = events::DESTINATION_REMOVE_OK,
            component = COMPONENT,
            address = address.as_str(),
            durable,
            "destination removed"
        );
        Ok(true)
    }

    /// Creates the queue for `request`, registers its binding and persists it
    /// when durable.
    pub(crate) async fn add_binding(
        &mut self,
        request: NewBinding,
    ) -> Result<Arc<Binding>, PostOfficeError> {
        let queue = self.collaborators.queue_factory.create_queue(
            None,
            &request.queue_name,
            request.filter.clone(),
            request.durable,
            request.temporary,
        );
        if self.backup.load(Ordering::Acquire) {
            queue.set_backup();
        }

        let binding = Arc::new(
            Binding::new(request.address, queue, request.fanout)
                .with_filter(request.filter)
                .with_temporary(request.temporary),
        );

        if let Err(err) = self.register_binding(binding.clone()).await {
            warn!(
                event = events::BINDING_ADD_FAILED,
                component = COMPONENT,
                address = binding.address().as_str(),
                queue = binding.queue_name(),
                err = %err,
                "binding registration failed"
            );
            return Err(err);
        }

        if binding.is_durable() {
            self.collaborators.storage.add_binding(&binding).await?;
        }

        info!(
            event = events::BINDING_ADD_OK,
            component = COMPONENT,
            address = binding.address().as_str(),
            queue = binding.queue_name(),
            durable = binding.is_durable(),
            fanout = binding.is_fanout(),
            "binding added"
        );
        Ok(binding)
    }

    /// Registers an already-built binding in memory only.
    pub(crate) async fn register_binding(
        &mut self,
        binding: Arc<Binding>,
    ) -> Result<(), PostOfficeError> {
        let address = binding.address().clone();
        self.collaborators.paging.create_page_store(&address).await?;

        let is_destination = self.address_manager.contains_destination(&address);
        let was_mapped = self.address_manager.register_binding(binding.clone())?;

        if !was_mapped && !is_destination {
            self.collaborators.management.register_address(&address)?;
        }
        self.collaborators
            .management
            .register_queue(binding.queue(), &address)?;
        Ok(())
    }

    pub(crate) async fn remove_binding(
        &mut self,
        queue_name: &str,
    ) -> Result<Arc<Binding>, PostOfficeError> {
        let (binding, last_mapping) = match self.address_manager.unregister_binding(queue_name) {
            Ok(removed) => removed,
            Err(err) => {
                warn!(
                    event = events::BINDING_REMOVE_FAILED,
                    component = COMPONENT,
                    queue = queue_name,
                    err = %err,
                    "binding removal failed"
                );
                return Err(err);
            }
        };
        let address = binding.address();

        if binding.is_durable() {
            self.collaborators.storage.delete_binding(&binding).await?;
        }
        self.collaborators
            .management
            .unregister_queue(queue_name, address)?;
        if last_mapping && !self.address_manager.contains_destination(address) {
            self.collaborators.management.unregister_address(address)?;
        }

        info!(
            event = events::BINDING_REMOVE_OK,
            component = COMPONENT,
            address = address.as_str(),
            queue = queue_name,
            last_mapping,
            "binding removed"
        );
        Ok(binding)
    }

    fn is_mapped(&self, address: &Address) -> bool {
        self.address_manager.mappings().contains_key(address)
    }
}

#[cfg(test)]
mod tests {
    use super::BindingLifecycle;
    use crate::address::Address;
    use crate::binding::NewBinding;
    use crate::collaborators::PagingManager;
    use crate::control_plane::send_lock::SendLockTable;
    use crate::error::PostOfficeError;
    use crate::routing::address_manager::AddressManager;
    use crate::routing::simple_address_manager::SimpleAddressManager;
    use crate::test_support::{collaborators, TestManagement, TestPagingManager};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn add_binding_creates_page_store_and_registers_address_once() {
        let manager = SimpleAddressManager::new();
        let paging = Arc::new(TestPagingManager::unbounded());
        let management = Arc::new(TestManagement::default());
        let collaborators = collaborators(paging.clone(), management.clone());
        let mut send_locks = SendLockTable::default();
        let backup = AtomicBool::new(false);
        let mut lifecycle =
            BindingLifecycle::new(&manager, &collaborators, &mut send_locks, &backup);

        lifecycle
            .add_binding(NewBinding::new("orders", "q1"))
            .await
            .unwrap();
        lifecycle
            .add_binding(NewBinding::new("orders", "q2"))
            .await
            .unwrap();

        assert!(paging.has_page_store(&Address::from("orders")));
        assert_eq!(*management.addresses.lock().unwrap(), vec!["orders"]);
        assert_eq!(management.queues.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn backup_post_office_creates_backup_queues() {
        let manager = SimpleAddressManager::new();
        let collaborators = collaborators(
            Arc::new(TestPagingManager::unbounded()),
            Arc::new(TestManagement::default()),
        );
        let mut send_locks = SendLockTable::default();
        let backup = AtomicBool::new(true);
        let mut lifecycle =
            BindingLifecycle::new(&manager, &collaborators, &mut send_locks, &backup);

        let binding = lifecycle
            .add_binding(NewBinding::new("orders", "q1"))
            .await
            .unwrap();

        assert!(binding.queue().is_backup());
    }

    #[tokio::test]
    async fn removing_last_binding_unregisters_address() {
        let manager = SimpleAddressManager::new();
        let management = Arc::new(TestManagement::default());
        let collaborators =
            collaborators(Arc::new(TestPagingManager::unbounded()), management.clone());
        let mut send_locks = SendLockTable::default();
        let backup = AtomicBool::new(false);
        let mut lifecycle =
            BindingLifecycle::new(&manager, &collaborators, &mut send_locks, &backup);
        lifecycle
            .add_binding(NewBinding::new("orders", "q1"))
            .await
            .unwrap();

        lifecycle.remove_binding("q1").await.unwrap();

        assert!(management.addresses.lock().unwrap().is_empty());
        assert!(management.queues.lock().unwrap().is_empty());
        assert!(matches!(
            lifecycle.remove_binding("q1").await,
            Err(PostOfficeError::BindingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn destination_keeps_address_registered_after_last_binding() {
        let manager = SimpleAddressManager::new();
        let management = Arc::new(TestManagement::default());
        let collaborators =
            collaborators(Arc::new(TestPagingManager::unbounded()), management.clone());
        let mut send_locks = SendLockTable::default();
        let backup = AtomicBool::new(false);
        let mut lifecycle =
            BindingLifecycle::new(&manager, &collaborators, &mut send_locks, &backup);
        let address = Address::from("orders");

        assert!(lifecycle.add_destination(&address, false).await.unwrap());
        assert!(!lifecycle.add_destination(&address, false).await.unwrap());
        lifecycle
            .add_binding(NewBinding::new("orders", "q1"))
            .await
            .unwrap();
        lifecycle.remove_binding("q1").await.unwrap();

        assert_eq!(*management.addresses.lock().unwrap(), vec!["orders"]);
        assert!(manager.contains_destination(&address));
    }

    #[tokio::test]
    async fn removing_destination_closes_its_send_lock() {
        let manager = SimpleAddressManager::new();
        let collaborators = collaborators(
            Arc::new(TestPagingManager::unbounded()),
            Arc::new(TestManagement::default()),
        );
        let mut send_locks = SendLockTable::default();
        let address = Address::from("orders");
        let lock = send_locks.get_or_create(&address);
        let backup = AtomicBool::new(false);
        let mut lifecycle =
            BindingLifecycle::new(&manager, &collaborators, &mut send_locks, &backup);
        lifecycle.add_destination(&address, false).await.unwrap();

        assert!(lifecycle.remove_destination(&address, false).await.unwrap());

        assert!(lock.is_closed());
        assert_eq!(send_locks.len(), 0);
    }
}
