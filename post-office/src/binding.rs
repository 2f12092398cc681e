//! Address-to-queue binding with its round-robin counter.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::address::Address;
use crate::collaborators::Queue;
use crate::message::{Filter, ServerMessage};

/// Association of one queue with one address.
///
/// Everything except `routings` is fixed at construction. The queue name is
/// the binding's identity across all addresses.
pub struct Binding {
    address: Address,
    queue: Arc<dyn Queue>,
    filter: Option<Arc<dyn Filter>>,
    temporary: bool,
    fanout: bool,
    routings: AtomicU64,
}

impl Binding {
    pub fn new(address: Address, queue: Arc<dyn Queue>, fanout: bool) -> Self {
        Self {
            address,
            queue,
            filter: None,
            temporary: false,
            fanout,
            routings: AtomicU64::new(0),
        }
    }

    pub fn with_filter(mut self, filter: Option<Arc<dyn Filter>>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }

    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.filter.as_ref()
    }

    pub fn is_durable(&self) -> bool {
        self.queue.is_durable()
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn is_fanout(&self) -> bool {
        self.fanout
    }

    /// Accepts the message when there is no filter or the filter matches.
    pub fn accepts(&self, message: &ServerMessage) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.matches(message))
    }

    /// Number of times this binding won a non-fanout routing decision.
    pub fn routings(&self) -> u64 {
        self.routings.load(Ordering::Acquire)
    }

    pub(crate) fn increment_routings(&self) -> u64 {
        self.routings.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Parameters for a binding the post office creates along with its queue.
#[derive(Clone)]
pub struct NewBinding {
    pub address: Address,
    pub queue_name: String,
    pub filter: Option<Arc<dyn Filter>>,
    pub durable: bool,
    pub temporary: bool,
    pub fanout: bool,
}

impl NewBinding {
    /// A non-durable, non-fanout binding without a filter.
    pub fn new(address: impl Into<Address>, queue_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            queue_name: queue_name.into(),
            filter: None,
            durable: false,
            temporary: false,
            fanout: false,
        }
    }

    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn fanout(mut self, fanout: bool) -> Self {
        self.fanout = fanout;
        self
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("address", &self.address)
            .field("queue", &self.queue_name())
            .field("durable", &self.is_durable())
            .field("temporary", &self.temporary)
            .field("fanout", &self.fanout)
            .field("routings", &self.routings())
            .finish_non_exhaustive()
    }
}
