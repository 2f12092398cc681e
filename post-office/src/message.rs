/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Messages, per-queue message references, and the filter seam.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::address::Address;
use crate::collaborators::Queue;

/// Identifier a producer attaches to detect re-delivered duplicates.
pub type DuplicateId = Vec<u8>;

/// Storage-level transaction identifier.
pub type TransactionId = u64;

/// Fixed bookkeeping cost of a message, excluding body and properties.
pub const MESSAGE_BASE_MEMORY_ESTIMATE: usize = 128;

/// Cost of one message reference held by a queue.
pub const REFERENCE_MEMORY_ESTIMATE: usize = 48;

/// `u64::MAX` is reserved to mean "no scheduled time".
const UNSCHEDULED: u64 = u64::MAX;

/// Inbound message as seen by the post office.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerMessage {
    message_id: u64,
    address: Address,
    durable: bool,
    body: Vec<u8>,
    properties: HashMap<String, String>,
}

impl ServerMessage {
    pub fn new(message_id: u64, address: impl Into<Address>) -> Self {
        Self {
            message_id,
            address: address.into(),
            durable: false,
            body: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// The same message sent on to another address, as when it expires.
    pub fn with_address(mut self, address: impl Into<Address>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn message_id(&self) -> u64 {
        self.message_id
    }

    /// Address the producer sent this message to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Approximate heap footprint used for flow-control accounting.
    pub fn memory_estimate(&self) -> usize {
        let properties: usize = self
            .properties
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum();
        MESSAGE_BASE_MEMORY_ESTIMATE + self.body.len() + properties
    }
}

/// Predicate deciding whether a binding accepts a message.
pub trait Filter: Send + Sync {
    fn matches(&self, message: &ServerMessage) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&ServerMessage) -> bool + Send + Sync,
{
    fn matches(&self, message: &ServerMessage) -> bool {
        self(message)
    }
}

/// One routing decision: a message bound for exactly one queue.
///
/// Fan-out produces one independent reference per queue; references are never
/// shared between queues.
pub struct MessageReference {
    message: Arc<ServerMessage>,
    queue: Arc<dyn Queue>,
    scheduled_delivery_time: AtomicU64,
}

impl MessageReference {
    pub fn new(message: Arc<ServerMessage>, queue: Arc<dyn Queue>) -> Self {
        Self {
            message,
            queue,
            scheduled_delivery_time: AtomicU64::new(UNSCHEDULED),
        }
    }

    pub fn message(&self) -> &Arc<ServerMessage> {
        &self.message
    }

    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }

    pub fn memory_estimate(&self) -> usize {
        REFERENCE_MEMORY_ESTIMATE
    }

    /// Scheduled delivery time in epoch milliseconds, if one was set.
    /// Zero is a valid time; `u64::MAX` reads back as unscheduled.
    pub fn scheduled_delivery_time(&self) -> Option<u64> {
        match self.scheduled_delivery_time.load(Ordering::Acquire) {
            UNSCHEDULED => None,
            time => Some(time),
        }
    }

    pub fn set_scheduled_delivery_time(&self, epoch_millis: u64) {
        self.scheduled_delivery_time
            .store(epoch_millis, Ordering::Release);
    }
}

impl Debug for MessageReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReference")
            .field("message_id", &self.message.message_id())
            .field("queue", &self.queue.name())
            .field("scheduled_delivery_time", &self.scheduled_delivery_time())
            .finish()
    }
}
