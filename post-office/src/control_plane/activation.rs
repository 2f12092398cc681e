//! Failover promotion of a backup post office.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::collaborators::Queue;
use crate::observability::events;
use crate::routing::address_manager::AddressManager;

const COMPONENT: &str = "activation";

pub(crate) struct ActivationController<'a> {
    address_manager: &'a dyn AddressManager,
    backup: &'a AtomicBool,
}

impl<'a> ActivationController<'a> {
    pub(crate) fn new(address_manager: &'a dyn AddressManager, backup: &'a AtomicBool) -> Self {
        Self {
            address_manager,
            backup,
        }
    }

    /// Clears the backup flag and activates every bound queue.
    ///
    /// Returns the queues whose activation is still pending and need
    /// catch-up handling by the caller.
    pub(crate) fn activate(&self) -> Vec<Arc<dyn Queue>> {
        self.backup.store(false, Ordering::Release);

        let bindings = self.address_manager.bindings();
        let pending: Vec<Arc<dyn Queue>> = bindings
            .values()
            .map(|binding| binding.queue())
            .filter(|queue| !queue.activate())
            .cloned()
            .collect();

        info!(
            event = events::ACTIVATION_OK,
            component = COMPONENT,
            queues = bindings.len(),
            pending = pending.len(),
            "post office activated"
        );
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::ActivationController;
    use crate::address::Address;
    use crate::binding::Binding;
    use crate::collaborators::Queue;
    use crate::routing::address_manager::AddressManager;
    use crate::routing::simple_address_manager::SimpleAddressManager;
    use crate::test_support::TestQueue;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn returns_only_queues_still_pending() {
        let manager = SimpleAddressManager::new();
        let ready = Arc::new(TestQueue::new("ready"));
        let pending = Arc::new(TestQueue::new("pending").pending_activation());
        ready.set_backup();
        for queue in [ready.clone(), pending.clone()] {
            manager
                .register_binding(Arc::new(Binding::new(
                    Address::from("orders"),
                    queue,
                    false,
                )))
                .unwrap();
        }
        let backup = AtomicBool::new(true);

        let returned = ActivationController::new(&manager, &backup).activate();

        let names: Vec<&str> = returned.iter().map(|queue| queue.name()).collect();
        assert_eq!(names, vec!["pending"]);
        assert!(!backup.load(Ordering::SeqCst));
        assert!(!ready.is_backup());
    }

    #[test]
    fn activating_empty_directory_returns_nothing() {
        let manager = SimpleAddressManager::new();
        let backup = AtomicBool::new(true);

        assert!(ActivationController::new(&manager, &backup)
            .activate()
            .is_empty());
    }
}
