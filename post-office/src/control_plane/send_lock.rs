//! Per-address send gate and the table that owns them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::address::Address;
use crate::error::PostOfficeError;

/// Coordinates senders with rare structural transitions on one address.
///
/// Senders hold a shared guard from [`SendLock::before_send`] while they
/// route; a transition takes the exclusive guard from [`SendLock::lock`] and
/// so waits for in-flight sends to drain. A closed lock refuses both.
pub struct SendLock {
    address: Address,
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl SendLock {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub async fn before_send(&self) -> Result<RwLockReadGuard<'_, ()>, PostOfficeError> {
        self.ensure_open()?;
        let guard = self.gate.read().await;
        self.ensure_open()?;
        Ok(guard)
    }

    pub async fn lock(&self) -> Result<RwLockWriteGuard<'_, ()>, PostOfficeError> {
        self.ensure_open()?;
        let guard = self.gate.write().await;
        self.ensure_open()?;
        Ok(guard)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), PostOfficeError> {
        if self.is_closed() {
            return Err(PostOfficeError::SendLockClosed(self.address.clone()));
        }
        Ok(())
    }
}

/// Send locks keyed by address. Only reachable through the post office's
/// structural critical section.
#[derive(Default)]
pub(crate) struct SendLockTable {
    locks: HashMap<Address, Arc<SendLock>>,
}

impl SendLockTable {
    pub(crate) fn get_or_create(&mut self, address: &Address) -> Arc<SendLock> {
        self.locks
            .entry(address.clone())
            .or_insert_with(|| Arc::new(SendLock::new(address.clone())))
            .clone()
    }

    /// Drops and closes the lock for `address`, if any.
    pub(crate) fn remove(&mut self, address: &Address) {
        if let Some(lock) = self.locks.remove(address) {
            lock.close();
        }
    }

    pub(crate) fn close_all(&mut self) {
        for (_, lock) in self.locks.drain() {
            lock.close();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
