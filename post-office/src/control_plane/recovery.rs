//! Ordered startup replay of persisted state.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::info;

use crate::address::Address;
use crate::binding::Binding;
use crate::collaborators::{Collaborators, DuplicateIdMap, Queue};
use crate::control_plane::binding_lifecycle::BindingLifecycle;
use crate::dedupe::cache_table::DuplicateIdCacheTable;
use crate::error::PostOfficeError;
use crate::observability::events;

const COMPONENT: &str = "recovery";

/// Recovery stages in the only order they may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecoveryStage {
    LoadPersisted,
    RegisterDestinations,
    RegisterBindings,
    CreatePageStores,
    ReplayJournal,
    LoadDuplicateCaches,
    ResumeDepage,
    Complete,
}

impl RecoveryStage {
    fn next(self) -> Self {
        match self {
            RecoveryStage::LoadPersisted => RecoveryStage::RegisterDestinations,
            RecoveryStage::RegisterDestinations => RecoveryStage::RegisterBindings,
            RecoveryStage::RegisterBindings => RecoveryStage::CreatePageStores,
            RecoveryStage::CreatePageStores => RecoveryStage::ReplayJournal,
            RecoveryStage::ReplayJournal => RecoveryStage::LoadDuplicateCaches,
            RecoveryStage::LoadDuplicateCaches => RecoveryStage::ResumeDepage,
            RecoveryStage::ResumeDepage | RecoveryStage::Complete => RecoveryStage::Complete,
        }
    }

    fn name(self) -> &'static str {
        match self {
            RecoveryStage::LoadPersisted => "load_persisted",
            RecoveryStage::RegisterDestinations => "register_destinations",
            RecoveryStage::RegisterBindings => "register_bindings",
            RecoveryStage::CreatePageStores => "create_page_stores",
            RecoveryStage::ReplayJournal => "replay_journal",
            RecoveryStage::LoadDuplicateCaches => "load_duplicate_caches",
            RecoveryStage::ResumeDepage => "resume_depage",
            RecoveryStage::Complete => "complete",
        }
    }
}

/// Counts of what one recovery run restored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub destinations: usize,
    pub bindings: usize,
    pub page_stores: usize,
    pub duplicate_caches: usize,
}

impl Display for RecoveryReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} destinations, {} bindings, {} page stores, {} duplicate caches",
            self.destinations, self.bindings, self.page_stores, self.duplicate_caches
        )
    }
}

/// Replays storage into a freshly constructed post office.
///
/// Each stage asserts that the previous one completed, so bindings can never
/// be registered before their destinations nor the journal replayed before
/// every address has a page store.
pub(crate) struct RecoveryLoader<'a> {
    lifecycle: BindingLifecycle<'a>,
    collaborators: &'a Collaborators,
    duplicate_caches: &'a DuplicateIdCacheTable,
    persist_id_cache: bool,
    stage: RecoveryStage,
    destinations: Vec<Address>,
    bindings: Vec<Binding>,
    queues: HashMap<u64, Arc<dyn Queue>>,
    duplicates: DuplicateIdMap,
    report: RecoveryReport,
}

impl<'a> RecoveryLoader<'a> {
    pub(crate) fn new(
        lifecycle: BindingLifecycle<'a>,
        collaborators: &'a Collaborators,
        duplicate_caches: &'a DuplicateIdCacheTable,
        persist_id_cache: bool,
    ) -> Self {
        Self {
            lifecycle,
            collaborators,
            duplicate_caches,
            persist_id_cache,
            stage: RecoveryStage::LoadPersisted,
            destinations: Vec::new(),
            bindings: Vec::new(),
            queues: HashMap::new(),
            duplicates: DuplicateIdMap::new(),
            report: RecoveryReport::default(),
        }
    }

    pub(crate) async fn run(mut self) -> Result<RecoveryReport, PostOfficeError> {
        self.load_persisted().await?;
        self.register_destinations().await?;
        self.register_bindings().await?;
        self.create_page_stores().await?;
        self.replay_journal().await?;
        self.load_duplicate_caches()?;
        self.resume_depage().await?;

        info!(
            event = events::RECOVERY_COMPLETE,
            component = COMPONENT,
            report = %self.report,
            "recovery complete"
        );
        Ok(self.report)
    }

    fn enter(&mut self, stage: RecoveryStage) -> Result<(), PostOfficeError> {
        if self.stage != stage {
            return Err(PostOfficeError::RecoveryOutOfOrder {
                expected: self.stage.name(),
                found: stage.name(),
            });
        }
        self.stage = stage.next();

        info!(
            event = events::RECOVERY_STAGE,
            component = COMPONENT,
            stage = stage.name(),
            "recovery stage"
        );
        Ok(())
    }

    pub(crate) async fn load_persisted(&mut self) -> Result<(), PostOfficeError> {
        self.enter(RecoveryStage::LoadPersisted)?;
        let loaded = self
            .collaborators
            .storage
            .load_bindings(self.collaborators.queue_factory.as_ref())
            .await?;
        self.destinations = loaded.destinations;
        self.bindings = loaded.bindings;
        Ok(())
    }

    pub(crate) async fn register_destinations(&mut self) -> Result<(), PostOfficeError> {
        self.enter(RecoveryStage::RegisterDestinations)?;
        for address in std::mem::take(&mut self.destinations) {
            if self.lifecycle.add_destination(&address, false).await? {
                self.report.destinations += 1;
            }
        }
        Ok(())
    }

    pub(crate) async fn register_bindings(&mut self) -> Result<(), PostOfficeError> {
        self.enter(RecoveryStage::RegisterBindings)?;
        for binding in std::mem::take(&mut self.bindings) {
            let binding = Arc::new(binding);
            self.queues
                .insert(binding.queue().persistence_id(), binding.queue().clone());
            self.lifecycle.register_binding(binding).await?;
            self.report.bindings += 1;
        }
        Ok(())
    }

    pub(crate) async fn create_page_stores(&mut self) -> Result<(), PostOfficeError> {
        self.enter(RecoveryStage::CreatePageStores)?;
        for address in self.lifecycle.address_manager().mappings().keys() {
            self.collaborators.paging.create_page_store(address).await?;
            self.report.page_stores += 1;
        }
        Ok(())
    }

    pub(crate) async fn replay_journal(&mut self) -> Result<(), PostOfficeError> {
        self.enter(RecoveryStage::ReplayJournal)?;
        self.duplicates = self
            .collaborators
            .storage
            .load_message_journal(&self.queues, self.collaborators.resource_manager.as_ref())
            .await?;
        Ok(())
    }

    pub(crate) fn load_duplicate_caches(&mut self) -> Result<(), PostOfficeError> {
        self.enter(RecoveryStage::LoadDuplicateCaches)?;
        for (address, entries) in std::mem::take(&mut self.duplicates) {
            let cache = self.duplicate_caches.get_or_create(&address);
            if self.persist_id_cache {
                cache.load(entries);
                self.report.duplicate_caches += 1;
            }
        }
        Ok(())
    }

    pub(crate) async fn resume_depage(&mut self) -> Result<(), PostOfficeError> {
        self.enter(RecoveryStage::ResumeDepage)?;
        self.collaborators.paging.start_global_depage().await
    }
}
