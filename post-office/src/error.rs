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

//! Failure taxonomy shared by the post office and its collaborators.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::address::Address;

/// Failures surfaced by post-office operations and collaborator contracts.
///
/// Flow-control rejection is deliberately absent: a rejected message routes to
/// zero references and is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOfficeError {
    /// Routing to an address with no registered destination while
    /// known-address enforcement is on.
    AddressDoesNotExist(Address),
    /// No binding is registered under the queue name.
    BindingNotFound(String),
    /// A binding with the queue name is already registered.
    BindingAlreadyExists(String),
    Storage(String),
    Paging(String),
    Management(String),
    Expiry { queue: String, reason: String },
    Config(String),
    RecoveryOutOfOrder {
        expected: &'static str,
        found: &'static str,
    },
    NotStarted,
    SendLockClosed(Address),
    /// A background runtime or its thread could not be created.
    Runtime(String),
}

impl Display for PostOfficeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PostOfficeError::AddressDoesNotExist(address) => {
                write!(f, "cannot route to address {address}: address does not exist")
            }
            PostOfficeError::BindingNotFound(queue) => {
                write!(f, "no binding registered for queue {queue}")
            }
            PostOfficeError::BindingAlreadyExists(queue) => {
                write!(f, "binding already exists for queue {queue}")
            }
            PostOfficeError::Storage(reason) => write!(f, "storage failure: {reason}"),
            PostOfficeError::Paging(reason) => write!(f, "paging failure: {reason}"),
            PostOfficeError::Management(reason) => write!(f, "management failure: {reason}"),
            PostOfficeError::Expiry { queue, reason } => {
                write!(f, "failed to expire messages for queue {queue}: {reason}")
            }
            PostOfficeError::Config(reason) => write!(f, "invalid configuration: {reason}"),
            PostOfficeError::RecoveryOutOfOrder { expected, found } => {
                write!(
                    f,
                    "recovery stage out of order: expected {expected}, found {found}"
                )
            }
            PostOfficeError::NotStarted => write!(f, "post office is not started"),
            PostOfficeError::SendLockClosed(address) => {
                write!(f, "send lock for address {address} is closed")
            }
            PostOfficeError::Runtime(reason) => write!(f, "runtime failure: {reason}"),
        }
    }
}

impl Error for PostOfficeError {}
