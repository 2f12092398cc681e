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

//! Post office settings, loadable from JSON5.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::PostOfficeError;
use crate::routing::wildcard::{
    WildcardConfiguration, DEFAULT_ANY_WORDS, DEFAULT_DELIMITER, DEFAULT_SINGLE_WORD,
};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct PostOfficeConfig {
    /// Refuse to route to addresses without a registered destination.
    pub check_allowable_addresses: bool,
    /// Use the hierarchical address directory instead of exact matching.
    pub wildcard_routing_enabled: bool,
    /// Start as a passive backup awaiting activation.
    pub backup: bool,
    pub id_cache_size: usize,
    pub persist_id_cache: bool,
    /// Zero disables the expiry scanner.
    pub message_expiry_scan_period_ms: u64,
    pub wildcard_delimiter: char,
    pub wildcard_any_words: char,
    pub wildcard_single_word: char,
}

impl Default for PostOfficeConfig {
    fn default() -> Self {
        Self {
            check_allowable_addresses: false,
            wildcard_routing_enabled: false,
            backup: false,
            id_cache_size: 2000,
            persist_id_cache: true,
            message_expiry_scan_period_ms: 30_000,
            wildcard_delimiter: DEFAULT_DELIMITER,
            wildcard_any_words: DEFAULT_ANY_WORDS,
            wildcard_single_word: DEFAULT_SINGLE_WORD,
        }
    }
}

impl PostOfficeConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, PostOfficeError> {
        let config: Self =
            json5::from_str(contents).map_err(|err| PostOfficeError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PostOfficeError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            PostOfficeError::Config(format!("unable to read {}: {err}", path.display()))
        })?;
        Self::from_json5_str(&contents)
    }

    /// The scan period, or `None` when expiry scanning is disabled.
    pub fn message_expiry_scan_period(&self) -> Option<Duration> {
        (self.message_expiry_scan_period_ms > 0)
            .then(|| Duration::from_millis(self.message_expiry_scan_period_ms))
    }

    pub fn wildcard_configuration(&self) -> WildcardConfiguration {
        WildcardConfiguration::new(
            self.wildcard_delimiter,
            self.wildcard_any_words,
            self.wildcard_single_word,
        )
    }

    pub(crate) fn validate(&self) -> Result<(), PostOfficeError> {
        let wildcard = [
            self.wildcard_delimiter,
            self.wildcard_any_words,
            self.wildcard_single_word,
        ];
        if wildcard[0] == wildcard[1] || wildcard[0] == wildcard[2] || wildcard[1] == wildcard[2] {
            return Err(PostOfficeError::Config(
                "wildcard delimiter and wildcard words must be distinct".to_string(),
            ));
        }
        if self.id_cache_size == 0 {
            return Err(PostOfficeError::Config(
                "id_cache_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PostOfficeConfig;
    use crate::error::PostOfficeError;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PostOfficeConfig::from_json5_str("{}").unwrap();

        assert_eq!(config, PostOfficeConfig::default());
        assert_eq!(
            config.message_expiry_scan_period(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn json5_overrides_selected_fields() {
        let config = PostOfficeConfig::from_json5_str(
            r#"{
                // comments are allowed
                check_allowable_addresses: true,
                wildcard_routing_enabled: true,
                message_expiry_scan_period_ms: 0,
                wildcard_delimiter: '/',
            }"#,
        )
        .unwrap();

        assert!(config.check_allowable_addresses);
        assert!(config.wildcard_routing_enabled);
        assert_eq!(config.message_expiry_scan_period(), None);
        assert_eq!(config.wildcard_configuration().delimiter(), '/');
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = PostOfficeConfig::from_json5_str("{ page_size: 10 }");

        assert!(matches!(result, Err(PostOfficeError::Config(_))));
    }

    #[test]
    fn clashing_wildcard_characters_are_rejected() {
        let result = PostOfficeConfig::from_json5_str("{ wildcard_any_words: '.' }");

        assert!(matches!(result, Err(PostOfficeError::Config(_))));
    }
}
