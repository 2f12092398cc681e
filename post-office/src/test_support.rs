//! In-crate test doubles for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::binding::Binding;
use crate::collaborators::{
    Collaborators, DuplicateIdMap, LoadedBindings, ManagementService, PagingManager, PagingStore,
    Queue, QueueFactory, QueueSettingsRepository, ResourceManager, Router, StorageManager,
};
use crate::error::PostOfficeError;
use crate::message::{Filter, MessageReference, ServerMessage, TransactionId};

#[derive(Default)]
pub(crate) struct TestQueue {
    name: String,
    persistence_id: u64,
    durable: bool,
    backup: AtomicBool,
    activates_immediately: bool,
    fail_expiry: bool,
    panic_on_expiry: bool,
    expiry_address: Option<Address>,
    pub(crate) appended: Mutex<Vec<MessageReference>>,
    pub(crate) expiry_runs: AtomicUsize,
}

impl TestQueue {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            activates_immediately: true,
            ..Default::default()
        }
    }

    pub(crate) fn with_persistence_id(mut self, persistence_id: u64) -> Self {
        self.persistence_id = persistence_id;
        self
    }

    pub(crate) fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub(crate) fn pending_activation(mut self) -> Self {
        self.activates_immediately = false;
        self
    }

    pub(crate) fn failing_expiry(mut self) -> Self {
        self.fail_expiry = true;
        self
    }

    /// Every expiry run sends the queued messages on to `address`.
    pub(crate) fn expiring_to(mut self, address: &str) -> Self {
        self.expiry_address = Some(Address::from(address));
        self
    }

    pub(crate) fn panicking_expiry(mut self) -> Self {
        self.panic_on_expiry = true;
        self
    }
}

#[async_trait]
impl Queue for TestQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn persistence_id(&self) -> u64 {
        self.persistence_id
    }

    fn is_durable(&self) -> bool {
        self.durable
    }

    fn is_backup(&self) -> bool {
        self.backup.load(Ordering::SeqCst)
    }

    fn set_backup(&self) {
        self.backup.store(true, Ordering::SeqCst);
    }

    fn activate(&self) -> bool {
        if self.activates_immediately {
            self.backup.store(false, Ordering::SeqCst);
        }
        self.activates_immediately
    }

    fn add_last(&self, reference: MessageReference) {
        self.appended.lock().unwrap().push(reference);
    }

    async fn expire_messages(
        &self,
        _storage: &dyn StorageManager,
        router: &dyn Router,
        _settings: &dyn QueueSettingsRepository,
    ) -> Result<(), PostOfficeError> {
        self.expiry_runs.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_expiry {
            panic!("expiry panicked for {}", self.name);
        }
        if self.fail_expiry {
            return Err(PostOfficeError::Expiry {
                queue: self.name.clone(),
                reason: "injected".to_string(),
            });
        }
        if let Some(address) = &self.expiry_address {
            let expired = std::mem::take(&mut *self.appended.lock().unwrap());
            for reference in expired {
                let message = reference
                    .message()
                    .as_ref()
                    .clone()
                    .with_address(address.clone());
                router.route_and_deliver(Arc::new(message)).await?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TestQueueFactory;

impl QueueFactory for TestQueueFactory {
    fn create_queue(
        &self,
        _persistence_id: Option<u64>,
        name: &str,
        _filter: Option<Arc<dyn Filter>>,
        durable: bool,
        _temporary: bool,
    ) -> Arc<dyn Queue> {
        let queue = TestQueue::new(name);
        Arc::new(if durable { queue.durable() } else { queue })
    }
}

pub(crate) fn binding(address: &str, queue: &str, fanout: bool) -> Arc<Binding> {
    Arc::new(Binding::new(
        Address::from(address),
        Arc::new(TestQueue::new(queue)),
        fanout,
    ))
}

pub(crate) fn filtered_binding(
    address: &str,
    queue: &str,
    fanout: bool,
    filter: Arc<dyn Filter>,
) -> Arc<Binding> {
    Arc::new(
        Binding::new(Address::from(address), Arc::new(TestQueue::new(queue)), fanout)
            .with_filter(Some(filter)),
    )
}

#[derive(Default)]
struct TestPagingStoreState {
    charged: usize,
    admissions: usize,
}

pub(crate) struct TestPagingStore {
    budget: usize,
    state: Mutex<TestPagingStoreState>,
}

#[async_trait]
impl PagingStore for TestPagingStore {
    async fn add_size(&self, size: usize) -> Result<bool, PostOfficeError> {
        let mut state = self.state.lock().unwrap();
        state.admissions += 1;
        if state.charged + size > self.budget {
            return Ok(false);
        }
        state.charged += size;
        Ok(true)
    }
}

pub(crate) struct TestPagingManager {
    budget: usize,
    stores: Mutex<HashMap<Address, Arc<TestPagingStore>>>,
}

impl TestPagingManager {
    pub(crate) fn unbounded() -> Self {
        Self::with_budget(usize::MAX)
    }

    pub(crate) fn with_budget(budget: usize) -> Self {
        Self {
            budget,
            stores: Mutex::new(HashMap::new()),
        }
    }

    fn store(&self, address: &Address) -> Arc<TestPagingStore> {
        self.stores
            .lock()
            .unwrap()
            .entry(address.clone())
            .or_insert_with(|| {
                Arc::new(TestPagingStore {
                    budget: self.budget,
                    state: Mutex::new(TestPagingStoreState::default()),
                })
            })
            .clone()
    }

    pub(crate) fn charged(&self, address: &Address) -> usize {
        self.store(address).state.lock().unwrap().charged
    }

    pub(crate) fn admissions(&self, address: &Address) -> usize {
        self.store(address).state.lock().unwrap().admissions
    }
}

#[async_trait]
impl PagingManager for TestPagingManager {
    async fn start(&self) -> Result<(), PostOfficeError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), PostOfficeError> {
        Ok(())
    }

    async fn create_page_store(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.store(address);
        Ok(())
    }

    async fn page_store(
        &self,
        address: &Address,
    ) -> Result<Arc<dyn PagingStore>, PostOfficeError> {
        Ok(self.store(address))
    }

    fn has_page_store(&self, address: &Address) -> bool {
        self.stores.lock().unwrap().contains_key(address)
    }

    async fn start_global_depage(&self) -> Result<(), PostOfficeError> {
        Ok(())
    }
}

/// Storage that accepts every write and records duplicate-id traffic.
#[derive(Default)]
pub(crate) struct TestStorage {
    next_id: AtomicUsize,
    pub(crate) persisted: Mutex<LoadedBindings>,
    pub(crate) journal_duplicates: Mutex<DuplicateIdMap>,
    pub(crate) scheduled: Mutex<Vec<(Option<TransactionId>, u64)>>,
    pub(crate) stored_duplicates: Mutex<Vec<(Address, Vec<u8>, u64)>>,
    pub(crate) deleted_duplicates: Mutex<Vec<u64>>,
}

#[async_trait]
impl StorageManager for TestStorage {
    async fn load_bindings(
        &self,
        _queue_factory: &dyn QueueFactory,
    ) -> Result<LoadedBindings, PostOfficeError> {
        Ok(std::mem::take(&mut *self.persisted.lock().unwrap()))
    }

    async fn add_binding(&self, _binding: &Binding) -> Result<(), PostOfficeError> {
        Ok(())
    }

    async fn delete_binding(&self, _binding: &Binding) -> Result<(), PostOfficeError> {
        Ok(())
    }

    async fn add_destination(&self, _address: &Address) -> Result<(), PostOfficeError> {
        Ok(())
    }

    async fn delete_destination(&self, _address: &Address) -> Result<(), PostOfficeError> {
        Ok(())
    }

    async fn load_message_journal(
        &self,
        _queues: &HashMap<u64, Arc<dyn Queue>>,
        _resource_manager: &dyn ResourceManager,
    ) -> Result<DuplicateIdMap, PostOfficeError> {
        Ok(std::mem::take(&mut *self.journal_duplicates.lock().unwrap()))
    }

    async fn update_scheduled_delivery_time(
        &self,
        reference: &MessageReference,
    ) -> Result<(), PostOfficeError> {
        self.scheduled
            .lock()
            .unwrap()
            .push((None, reference.message().message_id()));
        Ok(())
    }

    async fn update_scheduled_delivery_time_transactional(
        &self,
        transaction_id: TransactionId,
        reference: &MessageReference,
    ) -> Result<(), PostOfficeError> {
        self.scheduled
            .lock()
            .unwrap()
            .push((Some(transaction_id), reference.message().message_id()));
        Ok(())
    }

    fn generate_unique_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) as u64 + 1
    }

    async fn store_duplicate_id(
        &self,
        address: &Address,
        duplicate_id: &[u8],
        record_id: u64,
    ) -> Result<(), PostOfficeError> {
        self.stored_duplicates
            .lock()
            .unwrap()
            .push((address.clone(), duplicate_id.to_vec(), record_id));
        Ok(())
    }

    async fn delete_duplicate_id(&self, record_id: u64) -> Result<(), PostOfficeError> {
        self.deleted_duplicates.lock().unwrap().push(record_id);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TestSettings;

impl QueueSettingsRepository for TestSettings {
    fn match_settings(&self, _queue_name: &str) -> crate::collaborators::QueueSettings {
        Default::default()
    }
}

#[derive(Default)]
pub(crate) struct TestManagement {
    pub(crate) addresses: Mutex<Vec<String>>,
    pub(crate) queues: Mutex<Vec<String>>,
}

impl ManagementService for TestManagement {
    fn register_address(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.addresses.lock().unwrap().push(address.to_string());
        Ok(())
    }

    fn unregister_address(&self, address: &Address) -> Result<(), PostOfficeError> {
        self.addresses
            .lock()
            .unwrap()
            .retain(|registered| registered != address.as_str());
        Ok(())
    }

    fn register_queue(
        &self,
        queue: &Arc<dyn Queue>,
        _address: &Address,
    ) -> Result<(), PostOfficeError> {
        self.queues.lock().unwrap().push(queue.name().to_string());
        Ok(())
    }

    fn unregister_queue(
        &self,
        queue_name: &str,
        _address: &Address,
    ) -> Result<(), PostOfficeError> {
        self.queues.lock().unwrap().retain(|name| name != queue_name);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TestResourceManager;

impl ResourceManager for TestResourceManager {
    fn put_recovered_transaction(&self, _transaction_id: TransactionId) {}
}

pub(crate) fn collaborators(
    paging: Arc<TestPagingManager>,
    management: Arc<TestManagement>,
) -> Collaborators {
    collaborators_with_storage(Arc::new(TestStorage::default()), paging, management)
}

pub(crate) fn collaborators_with_storage(
    storage: Arc<TestStorage>,
    paging: Arc<TestPagingManager>,
    management: Arc<TestManagement>,
) -> Collaborators {
    Collaborators {
        storage,
        paging,
        queue_factory: Arc::new(TestQueueFactory),
        management,
        resource_manager: Arc::new(TestResourceManager),
        queue_settings: Arc::new(TestSettings),
    }
}

/// Records every message handed to it instead of routing.
#[derive(Default)]
pub(crate) struct TestRouter {
    routed: Mutex<Vec<Arc<ServerMessage>>>,
}

impl TestRouter {
    pub(crate) fn routed_addresses(&self) -> Vec<Address> {
        self.routed
            .lock()
            .unwrap()
            .iter()
            .map(|message| message.address().clone())
            .collect()
    }
}

#[async_trait]
impl Router for TestRouter {
    async fn route_and_deliver(
        &self,
        message: Arc<ServerMessage>,
    ) -> Result<usize, PostOfficeError> {
        self.routed.lock().unwrap().push(message);
        Ok(1)
    }
}
