//! Per-message routing policy: filters, fan-out, weighted round robin and
//! flow-control admission.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::binding::Binding;
use crate::collaborators::{PagingManager, Router};
use crate::data_plane::delivery;
use crate::error::PostOfficeError;
use crate::message::{MessageReference, ServerMessage};
use crate::observability::events;
use crate::routing::address_manager::AddressManager;

const COMPONENT: &str = "router";

/// Outcome of one filter pass over an address's binding set.
#[derive(Default)]
pub(crate) struct BindingSelection {
    pub(crate) fanout: Vec<Arc<Binding>>,
    pub(crate) round_robin: Option<Arc<Binding>>,
}

impl BindingSelection {
    /// Single pass: every accepting fan-out binding is kept, and among the
    /// accepting non-fanout bindings the one with the strictly lowest routing
    /// count wins. Ties keep the earliest candidate.
    pub(crate) fn select(bindings: &[Arc<Binding>], message: &ServerMessage) -> Self {
        let mut selection = Self::default();
        let mut lowest_routings: Option<u64> = None;

        for binding in bindings.iter().filter(|binding| binding.accepts(message)) {
            if binding.is_fanout() {
                selection.fanout.push(binding.clone());
                continue;
            }

            let routings = binding.routings();
            if lowest_routings.map_or(true, |lowest| routings < lowest) {
                lowest_routings = Some(routings);
                selection.round_robin = Some(binding.clone());
            }
        }

        selection
    }
}

/// Resolves a message into the references it should produce.
pub(crate) struct MessageRouter<'a> {
    address_manager: &'a dyn AddressManager,
    paging_manager: &'a dyn PagingManager,
    check_allowable_addresses: bool,
}

impl<'a> MessageRouter<'a> {
    pub(crate) fn new(
        address_manager: &'a dyn AddressManager,
        paging_manager: &'a dyn PagingManager,
        check_allowable_addresses: bool,
    ) -> Self {
        Self {
            address_manager,
            paging_manager,
            check_allowable_addresses,
        }
    }

    /// Returns the references to deliver, or none when nothing matched or
    /// flow control refused the aggregate cost.
    pub(crate) async fn route(
        &self,
        message: &Arc<ServerMessage>,
    ) -> Result<Vec<MessageReference>, PostOfficeError> {
        let address = message.address();
        let paging_store = self.paging_manager.page_store(address).await?;

        if self.check_allowable_addresses && !self.address_manager.contains_destination(address) {
            debug!(
                event = events::ROUTE_UNKNOWN_ADDRESS,
                component = COMPONENT,
                address = address.as_str(),
                msg_id = message.message_id(),
                "refusing to route to unknown address"
            );
            return Err(PostOfficeError::AddressDoesNotExist(address.clone()));
        }

        let Some(bindings) = self.address_manager.bindings_for(address) else {
            debug!(
                event = events::ROUTE_NO_BINDINGS,
                component = COMPONENT,
                address = address.as_str(),
                msg_id = message.message_id(),
                "no bindings registered for address"
            );
            return Ok(Vec::new());
        };

        let selection = BindingSelection::select(&bindings, message);

        let mut references: Vec<MessageReference> = selection
            .fanout
            .iter()
            .map(|binding| MessageReference::new(message.clone(), binding.queue().clone()))
            .collect();

        if let Some(binding) = selection.round_robin {
            references.push(MessageReference::new(
                message.clone(),
                binding.queue().clone(),
            ));
            binding.increment_routings();
        }

        if references.is_empty() {
            debug!(
                event = events::ROUTE_NO_MATCH,
                component = COMPONENT,
                address = address.as_str(),
                msg_id = message.message_id(),
                "no binding accepted message"
            );
            return Ok(references);
        }

        let reference_cost: usize = references
            .iter()
            .map(MessageReference::memory_estimate)
            .sum();
        let cost = message.memory_estimate() + reference_cost;

        if !paging_store.add_size(cost).await? {
            debug!(
                event = events::ROUTE_REJECTED_BY_FLOW_CONTROL,
                component = COMPONENT,
                address = address.as_str(),
                msg_id = message.message_id(),
                cost,
                references = references.len(),
                "flow control refused message; dropping references"
            );
            return Ok(Vec::new());
        }

        debug!(
            event = events::ROUTE_OK,
            component = COMPONENT,
            address = address.as_str(),
            msg_id = message.message_id(),
            references = references.len(),
            "message routed"
        );
        Ok(references)
    }
}

/// Owned routing handle for work that outlives a borrow of the post office,
/// such as the expiry scanner re-routing expired messages.
pub(crate) struct DirectoryRouter {
    address_manager: Arc<dyn AddressManager>,
    paging_manager: Arc<dyn PagingManager>,
    check_allowable_addresses: bool,
}

impl DirectoryRouter {
    pub(crate) fn new(
        address_manager: Arc<dyn AddressManager>,
        paging_manager: Arc<dyn PagingManager>,
        check_allowable_addresses: bool,
    ) -> Self {
        Self {
            address_manager,
            paging_manager,
            check_allowable_addresses,
        }
    }
}

#[async_trait]
impl Router for DirectoryRouter {
    async fn route_and_deliver(
        &self,
        message: Arc<ServerMessage>,
    ) -> Result<usize, PostOfficeError> {
        let references = MessageRouter::new(
            self.address_manager.as_ref(),
            self.paging_manager.as_ref(),
            self.check_allowable_addresses,
        )
        .route(&message)
        .await?;
        let delivered = references.len();
        delivery::deliver(references);
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::{BindingSelection, DirectoryRouter, MessageRouter};
    use crate::address::Address;
    use crate::binding::Binding;
    use crate::collaborators::{PagingManager, Router};
    use crate::error::PostOfficeError;
    use crate::message::{Filter, ServerMessage};
    use crate::routing::address_manager::AddressManager;
    use crate::routing::simple_address_manager::SimpleAddressManager;
    use crate::test_support::{binding, filtered_binding, TestPagingManager, TestQueue};
    use std::sync::Arc;

    fn names(selection: &BindingSelection) -> (Vec<String>, Option<String>) {
        (
            selection
                .fanout
                .iter()
                .map(|b| b.queue_name().to_string())
                .collect(),
            selection
                .round_robin
                .as_ref()
                .map(|b| b.queue_name().to_string()),
        )
    }

    #[test]
    fn lowest_counter_wins_and_ties_keep_first_seen() {
        let bindings: Vec<Arc<Binding>> = vec![
            binding("orders", "a", false),
            binding("orders", "b", false),
            binding("orders", "c", false),
        ];
        bindings[0].increment_routings();
        let message = ServerMessage::new(1, "orders");

        let (_, winner) = names(&BindingSelection::select(&bindings, &message));

        assert_eq!(winner.as_deref(), Some("b"));
    }

    #[test]
    fn fanout_bindings_ignore_counters() {
        let bindings: Vec<Arc<Binding>> = vec![
            binding("orders", "fan-1", true),
            binding("orders", "rr", false),
            binding("orders", "fan-2", true),
        ];
        bindings[0].increment_routings();
        let message = ServerMessage::new(1, "orders");

        let (fanout, winner) = names(&BindingSelection::select(&bindings, &message));

        assert_eq!(fanout, vec!["fan-1", "fan-2"]);
        assert_eq!(winner.as_deref(), Some("rr"));
    }

    #[test]
    fn filters_exclude_bindings_from_both_policies() {
        let eu_only: Arc<dyn Filter> =
            Arc::new(|message: &ServerMessage| message.property("region") == Some("eu"));
        let bindings: Vec<Arc<Binding>> = vec![
            filtered_binding("orders", "eu-fan", true, eu_only.clone()),
            filtered_binding("orders", "eu-rr", false, eu_only),
            binding("orders", "any-rr", false),
        ];
        bindings[2].increment_routings();

        let (fanout, winner) = names(&BindingSelection::select(
            &bindings,
            &ServerMessage::new(1, "orders").with_property("region", "us"),
        ));

        assert!(fanout.is_empty());
        assert_eq!(winner.as_deref(), Some("any-rr"));
    }

    #[tokio::test]
    async fn route_increments_only_the_winner() {
        let manager = SimpleAddressManager::new();
        let paging = TestPagingManager::unbounded();
        for name in ["a", "b", "c"] {
            manager.register_binding(binding("orders", name, false)).unwrap();
        }
        let router = MessageRouter::new(&manager, &paging, false);
        let message = Arc::new(ServerMessage::new(1, "orders"));

        for _ in 0..4 {
            assert_eq!(router.route(&message).await.unwrap().len(), 1);
        }

        let counts: Vec<u64> = ["a", "b", "c"]
            .iter()
            .map(|name| manager.binding(name).unwrap().routings())
            .collect();
        assert_eq!(counts, vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn unknown_address_fails_when_enforced() {
        let manager = SimpleAddressManager::new();
        let paging = TestPagingManager::unbounded();
        manager.register_binding(binding("orders", "q1", false)).unwrap();
        let router = MessageRouter::new(&manager, &paging, true);

        let result = router.route(&Arc::new(ServerMessage::new(1, "orders"))).await;

        assert_eq!(
            result.unwrap_err(),
            PostOfficeError::AddressDoesNotExist(Address::from("orders"))
        );
        assert_eq!(manager.binding("q1").unwrap().routings(), 0);
        assert!(paging.has_page_store(&Address::from("orders")));
    }

    #[tokio::test]
    async fn rejected_admission_yields_no_references() {
        let manager = SimpleAddressManager::new();
        let paging = TestPagingManager::with_budget(10);
        manager.register_binding(binding("orders", "q1", true)).unwrap();
        manager.register_binding(binding("orders", "q2", false)).unwrap();
        let router = MessageRouter::new(&manager, &paging, false);

        let references = router
            .route(&Arc::new(ServerMessage::new(1, "orders")))
            .await
            .unwrap();

        assert!(references.is_empty());
        assert_eq!(paging.charged(&Address::from("orders")), 0);
    }

    #[tokio::test]
    async fn admission_is_charged_once_for_the_aggregate_cost() {
        let manager = SimpleAddressManager::new();
        let paging = TestPagingManager::unbounded();
        manager.register_binding(binding("orders", "f1", true)).unwrap();
        manager.register_binding(binding("orders", "f2", true)).unwrap();
        manager.register_binding(binding("orders", "rr", false)).unwrap();
        let router = MessageRouter::new(&manager, &paging, false);
        let message = Arc::new(ServerMessage::new(1, "orders").with_body(vec![1u8; 100]));

        let references = router.route(&message).await.unwrap();

        let expected: usize = message.memory_estimate()
            + references.iter().map(|r| r.memory_estimate()).sum::<usize>();
        assert_eq!(references.len(), 3);
        assert_eq!(paging.charged(&Address::from("orders")), expected);
        assert_eq!(paging.admissions(&Address::from("orders")), 1);
    }

    #[tokio::test]
    async fn address_without_bindings_routes_nowhere() {
        let manager = SimpleAddressManager::new();
        let paging = TestPagingManager::unbounded();
        manager.add_destination(&Address::from("orders"));
        let router = MessageRouter::new(&manager, &paging, true);

        let references = router
            .route(&Arc::new(ServerMessage::new(1, "orders")))
            .await
            .unwrap();

        assert!(references.is_empty());
        assert_eq!(paging.admissions(&Address::from("orders")), 0);
    }

    #[tokio::test]
    async fn directory_router_delivers_what_it_routes() {
        let manager = Arc::new(SimpleAddressManager::new());
        let queue = Arc::new(TestQueue::new("dead-letters"));
        manager
            .register_binding(Arc::new(Binding::new(
                Address::from("expired"),
                queue.clone(),
                false,
            )))
            .unwrap();
        let router = DirectoryRouter::new(
            manager,
            Arc::new(TestPagingManager::unbounded()),
            false,
        );

        let delivered = router
            .route_and_deliver(Arc::new(ServerMessage::new(9, "expired")))
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(queue.appended.lock().unwrap().len(), 1);
    }
}
