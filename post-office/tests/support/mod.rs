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


use integration_test_utils::InMemoryBroker;
use post_office::{Address, NewBinding, PostOffice, PostOfficeConfig, ServerMessage};
use std::sync::Arc;

/// Config with the expiry scanner off so tests control every scan.
pub(crate) fn quiet_config() -> PostOfficeConfig {
    PostOfficeConfig {
        message_expiry_scan_period_ms: 0,
        ..Default::default()
    }
}

pub(crate) async fn make_started_post_office(
    name: &str,
    config: PostOfficeConfig,
    broker: &InMemoryBroker,
) -> PostOffice {
    let post_office = PostOffice::new(name, config, broker.collaborators())
        .expect("post office creation should succeed");
    post_office
        .start()
        .await
        .expect("post office start should succeed");
    post_office
}

pub(crate) async fn assert_add_binding_ok(post_office: &PostOffice, binding: NewBinding) {
    assert!(post_office.add_binding(binding).await.is_ok());
}

/// Routes and delivers one message, returning how many references it made.
pub(crate) async fn send(post_office: &PostOffice, message_id: u64, address: &str) -> usize {
    let message = Arc::new(ServerMessage::new(message_id, address));
    let references = post_office
        .route(&message)
        .await
        .expect("routing should succeed");
    let count = references.len();
    post_office.deliver(references);
    count
}

#[allow(dead_code)]
pub(crate) fn queue_names(post_office: &PostOffice, address: &str) -> Vec<String> {
    post_office
        .bindings_for_address(&Address::from(address))
        .iter()
        .map(|binding| binding.queue_name().to_string())
        .collect()
}
