// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Construction-time input of DNS handlers.
//!
//! [`DnsHandlerConfig`] carries the secret properties, the raw provider
//! configuration, the global manager configuration, the metrics sink and the
//! rate limiter. Property accessors accept a primary key plus aliases,
//! trim values and report missing or empty values as [`ConfigError`].

use super::rate_limiter::{AlwaysAllow, RateLimiter};
use super::validators::parse_bool;
use super::{Metrics, NoopMetrics, Properties};
use crate::config::{AdvancedOptions, DnsManagerConfiguration};
use crate::dns_errors::ConfigError;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Everything a handler factory needs to build a handler.
#[derive(Clone)]
pub struct DnsHandlerConfig {
    pub provider_type: String,
    pub properties: Properties,
    pub provider_config: Option<serde_json::Value>,
    pub global: Arc<DnsManagerConfiguration>,
    pub metrics: Arc<dyn Metrics>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl fmt::Debug for DnsHandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsHandlerConfig")
            .field("provider_type", &self.provider_type)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("provider_config", &self.provider_config)
            .finish_non_exhaustive()
    }
}

impl DnsHandlerConfig {
    /// Config with no-op metrics and an unlimited rate limiter.
    pub fn new(provider_type: impl Into<String>, properties: Properties) -> Self {
        Self {
            provider_type: provider_type.into(),
            properties,
            provider_config: None,
            global: Arc::new(DnsManagerConfiguration::default()),
            metrics: Arc::new(NoopMetrics),
            rate_limiter: Arc::new(AlwaysAllow),
        }
    }

    #[must_use]
    pub fn with_provider_config(mut self, provider_config: Option<serde_json::Value>) -> Self {
        self.provider_config = provider_config;
        self
    }

    #[must_use]
    pub fn with_global(mut self, global: Arc<DnsManagerConfiguration>) -> Self {
        self.global = global;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Advanced options configured for this provider type.
    #[must_use]
    pub fn advanced_options(&self) -> AdvancedOptions {
        self.global.advanced_options(&self.provider_type)
    }

    /// True if the zone id is listed in the blocked zones of the advanced options.
    #[must_use]
    pub fn is_blocked_zone(&self, zone_id: &str) -> bool {
        self.advanced_options()
            .blocked_zones
            .iter()
            .any(|z| z == zone_id)
    }

    /// Deserializes the provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProviderConfig`] if the configuration is missing or malformed.
    pub fn provider_config_as<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let value = self
            .provider_config
            .clone()
            .ok_or_else(|| ConfigError::InvalidProviderConfig {
                provider_type: self.provider_type.clone(),
                reason: "missing provider config".into(),
            })?;
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidProviderConfig {
            provider_type: self.provider_type.clone(),
            reason: e.to_string(),
        })
    }

    /// Returns the trimmed value of `key` or an alias.
    ///
    /// # Errors
    ///
    /// Returns an error if neither key is present or the value is empty.
    pub fn get_required_property(&self, key: &str, aliases: &[&str]) -> Result<String, ConfigError> {
        self.lookup(key, aliases, true)
            .map(|value| value.unwrap_or_default())
    }

    /// Returns the trimmed value of `key` or an alias, `None` if missing or empty.
    #[must_use]
    pub fn get_property(&self, key: &str, aliases: &[&str]) -> Option<String> {
        self.lookup(key, aliases, false).ok().flatten()
    }

    #[must_use]
    pub fn get_defaulted_property(&self, key: &str, default: &str, aliases: &[&str]) -> String {
        self.get_property(key, aliases)
            .unwrap_or_else(|| default.to_string())
    }

    /// # Errors
    ///
    /// Returns an error if the property is missing, empty or not an integer.
    pub fn get_required_int_property(&self, key: &str, aliases: &[&str]) -> Result<i64, ConfigError> {
        let value = self.get_required_property(key, aliases)?;
        parse_int(key, &value)
    }

    /// # Errors
    ///
    /// Returns an error if the property is set but not an integer.
    pub fn get_defaulted_int_property(
        &self,
        key: &str,
        default: i64,
        aliases: &[&str],
    ) -> Result<i64, ConfigError> {
        match self.get_property(key, aliases) {
            Some(value) => parse_int(key, &value),
            None => Ok(default),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the property is missing, empty or not a boolean.
    pub fn get_required_bool_property(&self, key: &str, aliases: &[&str]) -> Result<bool, ConfigError> {
        let value = self.get_required_property(key, aliases)?;
        parse_bool_property(key, &value)
    }

    /// # Errors
    ///
    /// Returns an error if the property is set but not a boolean.
    pub fn get_defaulted_bool_property(
        &self,
        key: &str,
        default: bool,
        aliases: &[&str],
    ) -> Result<bool, ConfigError> {
        match self.get_property(key, aliases) {
            Some(value) => parse_bool_property(key, &value),
            None => Ok(default),
        }
    }

    /// Fills `target` from the properties unless the provider config already set it.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is missing in both places, or defined in both.
    pub fn fill_required_property(
        &self,
        target: &mut Option<String>,
        key: &str,
        aliases: &[&str],
    ) -> Result<(), ConfigError> {
        if target.as_deref().is_none_or(str::is_empty) {
            *target = Some(self.get_required_property(key, aliases)?);
            return Ok(());
        }
        self.check_not_defined_in_config(key, aliases)
    }

    /// Fills `target` from the properties or `default` unless the provider config already set it.
    ///
    /// An empty `default` leaves `target` unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is defined in the provider config and in the properties.
    pub fn fill_default_property(
        &self,
        target: &mut Option<String>,
        default: &str,
        key: &str,
        aliases: &[&str],
    ) -> Result<(), ConfigError> {
        if target.as_deref().is_none_or(str::is_empty) {
            *target = match self.get_property(key, aliases) {
                Some(value) => Some(value),
                None if default.is_empty() => None,
                None => Some(default.to_string()),
            };
            return Ok(());
        }
        self.check_not_defined_in_config(key, aliases)
    }

    /// Boolean variant of [`Self::fill_default_property`]; the default value counts as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is malformed or defined twice.
    pub fn fill_default_bool_property(
        &self,
        target: &mut Option<bool>,
        default: bool,
        key: &str,
        aliases: &[&str],
    ) -> Result<(), ConfigError> {
        if target.is_none_or(|v| v == default) {
            *target = Some(self.get_defaulted_bool_property(key, default, aliases)?);
            return Ok(());
        }
        self.check_not_defined_in_config(key, aliases)
    }

    fn check_not_defined_in_config(&self, key: &str, aliases: &[&str]) -> Result<(), ConfigError> {
        let used = std::iter::once(key)
            .chain(aliases.iter().copied())
            .find(|k| self.properties.contains_key(*k));
        match used {
            Some(k) => Err(ConfigError::ConflictingProperty { key: k.to_string() }),
            None => Ok(()),
        }
    }

    fn lookup(&self, key: &str, aliases: &[&str], required: bool) -> Result<Option<String>, ConfigError> {
        let found = std::iter::once(key)
            .chain(aliases.iter().copied())
            .find_map(|k| self.properties.get(k).map(|v| (k, v)));
        let Some((used_key, value)) = found else {
            if !required {
                return Ok(None);
            }
            return Err(ConfigError::MissingProperty {
                keys: std::iter::once(key)
                    .chain(aliases.iter().copied())
                    .map(str::to_string)
                    .collect(),
            });
        };

        let trimmed = value.trim();
        if trimmed != value {
            warn!(
                provider = %self.provider_type,
                key = used_key,
                "Value in secret contains leading or trailing spaces which have been removed"
            );
        }
        if trimmed.is_empty() {
            if !required {
                return Ok(None);
            }
            return Err(ConfigError::EmptyProperty {
                key: used_key.to_string(),
            });
        }
        Ok(Some(trimmed.to_string()))
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse().map_err(|e| ConfigError::InvalidProperty {
        key: key.to_string(),
        reason: format!("must be an int value: {e}"),
    })
}

fn parse_bool_property(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::InvalidProperty {
        key: key.to_string(),
        reason: format!("invalid boolean value {value:?}"),
    })
}

#[cfg(test)]
#[path = "handler_config_tests.rs"]
mod handler_config_tests;
